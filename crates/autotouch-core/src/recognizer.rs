//! Gesture recognition: classifies a pointer down/up pair into an action.

use crate::{Action, Point};
use serde::{Deserialize, Serialize};

/// Travel below this distance counts as a stationary press.
pub const MOVEMENT_THRESHOLD_PX: f64 = 40.0;
/// A stationary press held at least this long is a long press.
pub const LONG_PRESS_THRESHOLD_MS: u64 = 500;
/// Gaps between gestures longer than this are recorded as delays.
pub const MIN_DELAY_MS: u64 = 50;
/// Nominal duration stored for every recognized click.
pub const CLICK_DURATION_MS: u64 = 50;
/// Recognized swipes never replay faster than this.
pub const MIN_SWIPE_DURATION_MS: u64 = 100;

/// One pointer-down/pointer-up pair as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerGesture {
    pub down: Point,
    pub up: Point,
    pub down_ms: u64,
    pub up_ms: u64,
}

impl PointerGesture {
    pub fn duration_ms(&self) -> u64 {
        self.up_ms.saturating_sub(self.down_ms)
    }
}

/// Thresholds used to classify gestures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub movement_threshold_px: f64,
    pub long_press_threshold_ms: u64,
    pub min_delay_ms: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            movement_threshold_px: MOVEMENT_THRESHOLD_PX,
            long_press_threshold_ms: LONG_PRESS_THRESHOLD_MS,
            min_delay_ms: MIN_DELAY_MS,
        }
    }
}

impl RecognizerConfig {
    /// Classify a press. Rules are checked in order: long press, click, swipe.
    pub fn classify(&self, down: Point, up: Point, down_ms: u64, up_ms: u64) -> Action {
        let distance = down.distance_to(up);
        let duration = up_ms.saturating_sub(down_ms);

        if distance < self.movement_threshold_px && duration >= self.long_press_threshold_ms {
            Action::long_press(down, duration)
                .with_description(format!("Long Press ({duration}ms)"))
        } else if distance < self.movement_threshold_px {
            Action::click(down, CLICK_DURATION_MS).with_description("Click")
        } else {
            Action::swipe(down, up, duration.max(MIN_SWIPE_DURATION_MS)).with_description(format!(
                "Swipe ({}px, {duration}ms)",
                distance as i64
            ))
        }
    }

    /// Delay action covering the pause before the current gesture, if any.
    ///
    /// Nothing is produced before the first recorded action, and gaps of at
    /// most `min_delay_ms` are dropped.
    pub fn maybe_insert_delay(
        &self,
        recorded: &[Action],
        previous_end_ms: u64,
        current_start_ms: u64,
    ) -> Option<Action> {
        let gap = current_start_ms.saturating_sub(previous_end_ms);
        if recorded.is_empty() || gap <= self.min_delay_ms {
            return None;
        }
        Some(Action::delay(gap).with_description(format!("Auto delay {gap}ms")))
    }
}

/// Classify with the default thresholds.
pub fn classify(down: Point, up: Point, down_ms: u64, up_ms: u64) -> Action {
    RecognizerConfig::default().classify(down, up, down_ms, up_ms)
}

/// Delay insertion with the default thresholds.
pub fn maybe_insert_delay(
    recorded: &[Action],
    previous_end_ms: u64,
    current_start_ms: u64,
) -> Option<Action> {
    RecognizerConfig::default().maybe_insert_delay(recorded, previous_end_ms, current_start_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActionKind;
    use proptest::prelude::*;

    #[test]
    fn test_click() {
        let action = classify(Point::new(100, 100), Point::new(105, 102), 1000, 1120);
        assert_eq!(action.kind, ActionKind::Click { at: Point::new(100, 100) });
        assert_eq!(action.duration_ms, CLICK_DURATION_MS);
        assert_eq!(action.description, "Click");
    }

    #[test]
    fn test_long_press_boundary() {
        let action = classify(Point::new(10, 10), Point::new(10, 10), 0, 500);
        assert_eq!(action.kind, ActionKind::LongPress { at: Point::new(10, 10) });
        assert_eq!(action.duration_ms, 500);

        let action = classify(Point::new(10, 10), Point::new(10, 10), 0, 499);
        assert!(matches!(action.kind, ActionKind::Click { .. }));
    }

    #[test]
    fn test_swipe_minimum_duration() {
        let action = classify(Point::new(0, 0), Point::new(0, 40), 0, 30);
        assert_eq!(
            action.kind,
            ActionKind::Swipe { from: Point::new(0, 0), to: Point::new(0, 40) }
        );
        assert_eq!(action.duration_ms, MIN_SWIPE_DURATION_MS);
        assert_eq!(action.description, "Swipe (40px, 30ms)");
    }

    #[test]
    fn test_up_before_down_is_zero_duration() {
        let action = classify(Point::new(0, 0), Point::new(0, 0), 100, 50);
        assert!(matches!(action.kind, ActionKind::Click { .. }));
    }

    #[test]
    fn test_delay_not_inserted_before_first_action() {
        assert!(maybe_insert_delay(&[], 0, 5000).is_none());
    }

    #[test]
    fn test_delay_threshold() {
        let recorded = vec![Action::click(Point::new(0, 0), 50)];
        assert!(maybe_insert_delay(&recorded, 1000, 1050).is_none());

        let delay = maybe_insert_delay(&recorded, 1000, 1051).unwrap();
        assert!(delay.is_delay());
        assert_eq!(delay.duration_ms, 51);
        assert_eq!(delay.description, "Auto delay 51ms");
    }

    #[test]
    fn test_custom_thresholds() {
        let config = RecognizerConfig {
            movement_threshold_px: 10.0,
            long_press_threshold_ms: 200,
            min_delay_ms: 0,
        };
        let action = config.classify(Point::new(0, 0), Point::new(0, 20), 0, 50);
        assert!(matches!(action.kind, ActionKind::Swipe { .. }));
        let action = config.classify(Point::new(0, 0), Point::new(0, 5), 0, 250);
        assert!(matches!(action.kind, ActionKind::LongPress { .. }));
    }

    proptest! {
        #[test]
        fn prop_stationary_press(dx in -28i32..=28, dy in -28i32..=28, down in 0u64..1_000_000, t in 0u64..5_000) {
            let start = Point::new(500, 500);
            let end = Point::new(500 + dx, 500 + dy);
            let action = classify(start, end, down, down + t);
            if t >= LONG_PRESS_THRESHOLD_MS {
                prop_assert_eq!(action.kind, ActionKind::LongPress { at: start });
                prop_assert_eq!(action.duration_ms, t);
            } else {
                prop_assert_eq!(action.kind, ActionKind::Click { at: start });
                prop_assert_eq!(action.duration_ms, CLICK_DURATION_MS);
            }
        }

        #[test]
        fn prop_moving_press_is_swipe(dx in 40i32..2000, dy in -2000i32..2000, t in 0u64..5_000) {
            let start = Point::new(0, 0);
            let end = Point::new(dx, dy);
            let action = classify(start, end, 10, 10 + t);
            prop_assert_eq!(action.kind, ActionKind::Swipe { from: start, to: end });
            prop_assert_eq!(action.duration_ms, t.max(MIN_SWIPE_DURATION_MS));
        }

        #[test]
        fn prop_delay_equals_gap(prev in 0u64..1_000_000, gap in 0u64..100_000) {
            let recorded = vec![Action::click(Point::new(0, 0), 50)];
            let delay = maybe_insert_delay(&recorded, prev, prev + gap);
            if gap > MIN_DELAY_MS {
                let delay = delay.unwrap();
                prop_assert!(delay.is_delay());
                prop_assert_eq!(delay.duration_ms, gap);
            } else {
                prop_assert!(delay.is_none());
            }
        }
    }
}
