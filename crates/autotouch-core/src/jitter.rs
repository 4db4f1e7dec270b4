//! Randomization policy: how much jitter an action gets, and drawing it.

use crate::{Action, ActionKind, GlobalSettings, Point, Script};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Floor for a jittered click duration.
pub const CLICK_MIN_DURATION_MS: u64 = 10;
/// Floor for a jittered long-press or swipe duration.
pub const PRESS_MIN_DURATION_MS: u64 = 100;

/// Effective jitter bounds for a single action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JitterBounds {
    /// Per-axis offset is drawn from `[-r, +r]`.
    pub offset_radius_px: u32,
    /// Press/swipe duration variance.
    pub duration_variance_ms: u64,
    /// Variance applied to delay actions.
    pub delay_variance_ms: u64,
}

impl JitterBounds {
    /// Resolve bounds for `action` within `script` under `settings`.
    ///
    /// With randomization disabled everything is zero. Otherwise an
    /// action-level override wins outright, and without one the script value
    /// acts as a floor under the global value.
    pub fn resolve(action: &Action, script: &Script, settings: &GlobalSettings) -> Self {
        if !settings.randomization_enabled {
            return Self::default();
        }

        let offset_radius_px = action.override_random_offset_px.unwrap_or_else(|| {
            script
                .global_random_offset_px
                .unwrap_or(0)
                .max(settings.click_offset_radius_px)
        });

        let delay_variance_ms = action.override_random_delay_ms.unwrap_or_else(|| {
            script
                .global_random_delay_ms
                .unwrap_or(0)
                .max(settings.delay_variance_ms)
        });

        Self {
            offset_radius_px,
            duration_variance_ms: settings.click_duration_variance_ms,
            delay_variance_ms,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Shared random source. Access is serialized so one instance can back
/// several dispatchers and recorders.
pub struct Jitter {
    rng: Mutex<StdRng>,
}

impl Jitter {
    /// Seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic source for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Apply jitter to an action's geometry and duration.
    ///
    /// Delays keep their geometry and get the delay variance; gestures get
    /// the offset radius and the duration variance with a kind-specific floor.
    pub fn apply(&self, action: &Action, bounds: &JitterBounds) -> (ActionKind, u64) {
        let r = bounds.offset_radius_px;
        let d = bounds.duration_variance_ms;
        match action.kind {
            ActionKind::Click { at } => (
                ActionKind::Click { at: self.point(at, r) },
                self.duration(action.duration_ms, d, CLICK_MIN_DURATION_MS),
            ),
            ActionKind::LongPress { at } => (
                ActionKind::LongPress { at: self.point(at, r) },
                self.duration(action.duration_ms, d, PRESS_MIN_DURATION_MS),
            ),
            ActionKind::Swipe { from, to } => (
                ActionKind::Swipe {
                    from: self.point(from, r),
                    to: self.point(to, r),
                },
                self.duration(action.duration_ms, d, PRESS_MIN_DURATION_MS),
            ),
            ActionKind::MultiTouch { at } => {
                (ActionKind::MultiTouch { at: self.point(at, r) }, action.duration_ms)
            }
            ActionKind::Delay => (
                ActionKind::Delay,
                self.delay(action.duration_ms, bounds.delay_variance_ms),
            ),
        }
    }

    /// Offset each axis independently by up to `radius_px`.
    pub fn point(&self, base: Point, radius_px: u32) -> Point {
        if radius_px == 0 {
            return base;
        }
        let r = i64::from(radius_px);
        let dx = self.offset(r);
        let dy = self.offset(r);
        Point::new(shift(base.x, dx), shift(base.y, dy))
    }

    /// `base` plus up to `variance_ms` either way, floored at `min_ms`.
    pub fn duration(&self, base_ms: u64, variance_ms: u64, min_ms: u64) -> u64 {
        self.varied(base_ms, variance_ms).max(min_ms)
    }

    /// Jittered delay, clamped at zero.
    pub fn delay(&self, base_ms: u64, variance_ms: u64) -> u64 {
        self.varied(base_ms, variance_ms)
    }

    fn varied(&self, base_ms: u64, variance_ms: u64) -> u64 {
        if variance_ms == 0 {
            return base_ms;
        }
        let v = i64::try_from(variance_ms).unwrap_or(i64::MAX);
        let delta = self.offset(v);
        let value = i128::from(base_ms) + i128::from(delta);
        u64::try_from(value.max(0)).unwrap_or(u64::MAX)
    }

    fn offset(&self, bound: i64) -> i64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_range(-bound..=bound)
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::new()
    }
}

fn shift(coord: i32, delta: i64) -> i32 {
    let moved = i64::from(coord) + delta;
    moved.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn enabled(offset: u32, delay: u64) -> GlobalSettings {
        GlobalSettings {
            randomization_enabled: true,
            click_offset_radius_px: offset,
            click_duration_variance_ms: 50,
            delay_variance_ms: delay,
        }
    }

    fn script_with(offset: Option<u32>, delay: Option<u64>) -> Script {
        let mut script = Script::new("jitter");
        script.global_random_offset_px = offset;
        script.global_random_delay_ms = delay;
        script
    }

    #[test]
    fn test_override_wins() {
        let action = Action::click(Point::new(0, 0), 50).with_offset_override(5);
        for script_value in [None, Some(0), Some(3), Some(100)] {
            let bounds =
                JitterBounds::resolve(&action, &script_with(script_value, None), &enabled(20, 0));
            assert_eq!(bounds.offset_radius_px, 5);
        }
    }

    #[test]
    fn test_script_value_is_floor() {
        let action = Action::click(Point::new(0, 0), 50);
        let bounds = JitterBounds::resolve(&action, &script_with(Some(30), None), &enabled(10, 0));
        assert_eq!(bounds.offset_radius_px, 30);

        let bounds = JitterBounds::resolve(&action, &script_with(Some(4), None), &enabled(10, 0));
        assert_eq!(bounds.offset_radius_px, 10);
    }

    #[test]
    fn test_delay_variance_resolution() {
        let action = Action::delay(1000);
        let bounds =
            JitterBounds::resolve(&action, &script_with(None, Some(400)), &enabled(0, 100));
        assert_eq!(bounds.delay_variance_ms, 400);

        let action = Action::delay(1000).with_delay_override(7);
        let bounds =
            JitterBounds::resolve(&action, &script_with(None, Some(400)), &enabled(0, 100));
        assert_eq!(bounds.delay_variance_ms, 7);
    }

    #[test]
    fn test_disabled_means_zero() {
        let action = Action::click(Point::new(0, 0), 50)
            .with_offset_override(5)
            .with_delay_override(5);
        let settings = GlobalSettings {
            randomization_enabled: false,
            ..enabled(20, 100)
        };
        let bounds = JitterBounds::resolve(&action, &script_with(Some(30), Some(30)), &settings);
        assert!(bounds.is_zero());
    }

    #[test]
    fn test_zero_bounds_are_identity() {
        let jitter = Jitter::seeded(1);
        assert_eq!(jitter.point(Point::new(7, 9), 0), Point::new(7, 9));
        assert_eq!(jitter.duration(80, 0, 10), 80);
        assert_eq!(jitter.delay(250, 0), 250);
    }

    #[test]
    fn test_duration_floor() {
        let jitter = Jitter::seeded(3);
        for _ in 0..200 {
            assert!(jitter.duration(0, 50, CLICK_MIN_DURATION_MS) >= CLICK_MIN_DURATION_MS);
            assert!(jitter.duration(120, 500, PRESS_MIN_DURATION_MS) >= PRESS_MIN_DURATION_MS);
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = Jitter::seeded(42);
        let b = Jitter::seeded(42);
        for _ in 0..20 {
            assert_eq!(a.point(Point::new(0, 0), 15), b.point(Point::new(0, 0), 15));
        }
    }

    proptest! {
        #[test]
        fn prop_point_within_radius(x in -5000i32..5000, y in -5000i32..5000, r in 0u32..200, seed: u64) {
            let jitter = Jitter::seeded(seed);
            let p = jitter.point(Point::new(x, y), r);
            prop_assert!((i64::from(p.x) - i64::from(x)).abs() <= i64::from(r));
            prop_assert!((i64::from(p.y) - i64::from(y)).abs() <= i64::from(r));
        }

        #[test]
        fn prop_delay_within_variance(base in 0u64..100_000, v in 0u64..5_000, seed: u64) {
            let jitter = Jitter::seeded(seed);
            let d = jitter.delay(base, v);
            prop_assert!(d <= base + v);
            prop_assert!(d >= base.saturating_sub(v));
        }

        #[test]
        fn prop_disabled_leaves_base(x in -5000i32..5000, y in -5000i32..5000, d in 0u64..10_000, o in 0u32..100, seed: u64) {
            let settings = GlobalSettings { randomization_enabled: false, ..enabled(o, u64::from(o)) };
            let action = Action::click(Point::new(x, y), d);
            let bounds = JitterBounds::resolve(&action, &script_with(Some(o), Some(u64::from(o))), &settings);
            let jitter = Jitter::seeded(seed);
            prop_assert_eq!(jitter.point(Point::new(x, y), bounds.offset_radius_px), Point::new(x, y));
            prop_assert_eq!(jitter.delay(d, bounds.delay_variance_ms), d);
        }
    }
}
