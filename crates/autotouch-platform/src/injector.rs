//! Stroke injection through the OS mouse.
//!
//! A stroke becomes: move to the first point, press the left button, follow
//! the path until `duration_ms` has elapsed, release.

use crate::{PlatformError, PlatformResult};
use autotouch_core::{Point, Stroke, StrokeSink};
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Interval between pointer moves while following a path.
pub const MOVE_STEP_MS: u64 = 16;

/// Sink that accepts every stroke without touching the host.
pub struct NoopStrokeSink;

impl StrokeSink for NoopStrokeSink {
    fn dispatch_stroke(&self, stroke: &Stroke) -> bool {
        debug!(?stroke, "NoopStrokeSink: would inject stroke");
        true
    }
}

/// Real stroke sink using the `enigo` crate.
pub struct EnigoStrokeSink {
    enigo: Mutex<Enigo>,
}

impl EnigoStrokeSink {
    pub fn new() -> PlatformResult<Self> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| {
            PlatformError::InjectionFailed(format!("failed to create Enigo: {e}"))
        })?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn replay(&self, stroke: &Stroke) -> PlatformResult<()> {
        let Some(&start) = stroke.path.first() else {
            return Err(PlatformError::InjectionFailed("empty stroke path".into()));
        };

        if stroke.start_offset_ms > 0 {
            thread::sleep(Duration::from_millis(stroke.start_offset_ms));
        }

        let mut enigo = self
            .enigo
            .lock()
            .map_err(|_| PlatformError::InjectionFailed("enigo lock poisoned".into()))?;

        enigo
            .move_mouse(start.x, start.y, Coordinate::Abs)
            .map_err(|e| PlatformError::InjectionFailed(e.to_string()))?;
        enigo
            .button(Button::Left, Direction::Press)
            .map_err(|e| PlatformError::InjectionFailed(e.to_string()))?;

        let pressed_at = Instant::now();
        let followed = stroke_timeline(stroke, MOVE_STEP_MS)
            .into_iter()
            .try_for_each(|(point, at_ms)| {
                let due = Duration::from_millis(at_ms);
                if let Some(remaining) = due.checked_sub(pressed_at.elapsed()) {
                    thread::sleep(remaining);
                }
                enigo
                    .move_mouse(point.x, point.y, Coordinate::Abs)
                    .map_err(|e| PlatformError::InjectionFailed(e.to_string()))
            });

        // Release even if a move failed so the button is never left down.
        let released = enigo
            .button(Button::Left, Direction::Release)
            .map_err(|e| PlatformError::InjectionFailed(e.to_string()));

        followed.and(released)
    }
}

impl StrokeSink for EnigoStrokeSink {
    fn dispatch_stroke(&self, stroke: &Stroke) -> bool {
        debug!(
            points = stroke.path.len(),
            duration_ms = stroke.duration_ms,
            "injecting stroke"
        );
        match self.replay(stroke) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "stroke injection failed");
                false
            }
        }
    }
}

/// Pointer positions to visit after the press, with their time offsets in
/// milliseconds from the press. The last entry is always the path's end at
/// `duration_ms`.
pub fn stroke_timeline(stroke: &Stroke, step_ms: u64) -> Vec<(Point, u64)> {
    let path = &stroke.path;
    let Some(&first) = path.first() else {
        return Vec::new();
    };
    let last = path[path.len() - 1];
    let duration = stroke.duration_ms;

    if path.len() == 1 {
        return vec![(first, duration)];
    }

    let step = step_ms.max(1);
    let mut samples = Vec::new();
    let mut t = step;
    while t < duration {
        samples.push((point_along(path, t as f64 / duration as f64), t));
        t += step;
    }
    samples.push((last, duration));
    samples
}

/// Point at `fraction` (0..=1) of the path's total length.
fn point_along(path: &[Point], fraction: f64) -> Point {
    let total: f64 = path.windows(2).map(|w| w[0].distance_to(w[1])).sum();
    if total == 0.0 {
        return path[0];
    }

    let mut remaining = total * fraction.clamp(0.0, 1.0);
    for w in path.windows(2) {
        let len = w[0].distance_to(w[1]);
        if remaining <= len && len > 0.0 {
            let k = remaining / len;
            let x = f64::from(w[0].x) + (f64::from(w[1].x) - f64::from(w[0].x)) * k;
            let y = f64::from(w[0].y) + (f64::from(w[1].y) - f64::from(w[0].y)) * k;
            return Point::new(x.round() as i32, y.round() as i32);
        }
        remaining -= len;
    }
    path[path.len() - 1]
}
