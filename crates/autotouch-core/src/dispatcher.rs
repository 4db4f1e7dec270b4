//! Gesture dispatch: turns actions into host strokes.

use crate::jitter::PRESS_MIN_DURATION_MS;
use crate::{Action, ActionKind, Point};
use tracing::{debug, warn};

/// Upper bound for a press or swipe replayed live while recording.
const PASSTHROUGH_MAX_MS: u64 = 2000;

/// A single continuous synthetic touch path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stroke {
    /// Ordered points; one point is a stationary press.
    pub path: Vec<Point>,
    pub start_offset_ms: u64,
    pub duration_ms: u64,
}

impl Stroke {
    pub fn tap(at: Point, duration_ms: u64) -> Self {
        Self {
            path: vec![at],
            start_offset_ms: 0,
            duration_ms,
        }
    }

    pub fn line(from: Point, to: Point, duration_ms: u64) -> Self {
        Self {
            path: vec![from, to],
            start_offset_ms: 0,
            duration_ms,
        }
    }
}

/// Host capability that injects strokes (implemented by autotouch-platform).
///
/// Returns whether the host accepted the stroke.
pub trait StrokeSink: Send + Sync {
    fn dispatch_stroke(&self, stroke: &Stroke) -> bool;
}

impl<T: StrokeSink + ?Sized> StrokeSink for std::sync::Arc<T> {
    fn dispatch_stroke(&self, stroke: &Stroke) -> bool {
        (**self).dispatch_stroke(stroke)
    }
}

/// Converts actions into strokes and hands them to the host.
pub struct GestureDispatcher<S> {
    sink: S,
}

impl<S: StrokeSink> GestureDispatcher<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Dispatch already-jittered geometry. Returns false if the host
    /// rejected the stroke.
    pub fn dispatch(&self, geometry: &ActionKind, duration_ms: u64) -> bool {
        match *geometry {
            ActionKind::Click { at } => {
                debug!(x = at.x, y = at.y, duration_ms, "dispatching click");
                self.send(Stroke::tap(at, duration_ms))
            }
            ActionKind::LongPress { at } => {
                let duration_ms = duration_ms.max(PRESS_MIN_DURATION_MS);
                debug!(x = at.x, y = at.y, duration_ms, "dispatching long press");
                self.send(Stroke::tap(at, duration_ms))
            }
            ActionKind::Swipe { from, to } => {
                let duration_ms = duration_ms.max(PRESS_MIN_DURATION_MS);
                debug!(?from, ?to, duration_ms, "dispatching swipe");
                self.send(Stroke::line(from, to, duration_ms))
            }
            // Multi-pointer replay is not supported; report success.
            ActionKind::MultiTouch { .. } => {
                debug!("multi touch is a no-op");
                true
            }
            // Waits are driven by the scheduler.
            ActionKind::Delay => true,
        }
    }

    /// Replay a just-recorded gesture so the user sees it happen.
    ///
    /// Uses the recorded geometry without jitter. Only clicks, long presses
    /// and swipes are passed through; presses and swipes are capped at 2s so
    /// recording is never blocked for long.
    pub fn dispatch_passthrough(&self, action: &Action) -> bool {
        let stroke = match action.kind {
            ActionKind::Click { at } => Stroke::tap(at, crate::CLICK_DURATION_MS),
            ActionKind::LongPress { at } => {
                Stroke::tap(at, action.duration_ms.min(PASSTHROUGH_MAX_MS))
            }
            ActionKind::Swipe { from, to } => Stroke::line(
                from,
                to,
                action
                    .duration_ms
                    .clamp(PRESS_MIN_DURATION_MS, PASSTHROUGH_MAX_MS),
            ),
            ActionKind::MultiTouch { .. } | ActionKind::Delay => return false,
        };
        debug!(kind = action.kind.name(), "passthrough");
        self.send(stroke)
    }

    fn send(&self, stroke: Stroke) -> bool {
        let accepted = self.sink.dispatch_stroke(&stroke);
        if !accepted {
            warn!(points = stroke.path.len(), duration_ms = stroke.duration_ms, "host rejected stroke");
        }
        accepted
    }
}
