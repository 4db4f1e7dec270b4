//! Global pointer hook for recording.
//!
//! Left-button press/release events are paired into `PointerGesture`s using
//! the last reported cursor position. Timestamps are milliseconds since the
//! hook started.

use crate::{PlatformError, PlatformResult};
use autotouch_core::{Point, PointerGesture};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread;
use std::time::Duration;

mod rdev_impl;

/// Pairs button presses with their releases.
#[derive(Debug, Default)]
pub struct PointerPairer {
    position: Point,
    pending: Option<(Point, u64)>,
}

impl PointerPairer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known cursor position.
    pub fn position(&self) -> Point {
        self.position
    }

    pub fn moved(&mut self, at: Point) {
        self.position = at;
    }

    /// A press while another is pending restarts the gesture.
    pub fn pressed(&mut self, time_ms: u64) {
        self.pending = Some((self.position, time_ms));
    }

    pub fn released(&mut self, time_ms: u64) -> Option<PointerGesture> {
        let (down, down_ms) = self.pending.take()?;
        Some(PointerGesture {
            down,
            up: self.position,
            down_ms,
            up_ms: time_ms.max(down_ms),
        })
    }
}

/// Handle to control the pointer hook.
pub struct PointerHookHandle {
    gesture_rx: Receiver<PointerGesture>,
    stop_tx: Sender<()>,
}

impl PointerHookHandle {
    /// Wait up to `timeout` for the next gesture.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PointerGesture> {
        self.gesture_rx.recv_timeout(timeout).ok()
    }

    /// Signal the hook to stop forwarding gestures.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }
}

impl Drop for PointerHookHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start capturing global pointer gestures.
pub fn start_pointer_hook() -> PlatformResult<PointerHookHandle> {
    let (gesture_tx, gesture_rx) = bounded(256);
    let (stop_tx, stop_rx) = bounded(1);

    // The listener blocks for the life of the process, so the thread is
    // detached rather than joined.
    thread::Builder::new()
        .name("autotouch-pointer-hook".into())
        .spawn(move || rdev_impl::start_hook(gesture_tx, stop_rx))
        .map_err(|e| PlatformError::Hook(e.to_string()))?;

    Ok(PointerHookHandle {
        gesture_rx,
        stop_tx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_press_and_release() {
        let mut pairer = PointerPairer::new();
        pairer.moved(Point::new(10, 10));
        pairer.pressed(100);
        pairer.moved(Point::new(300, 10));
        let gesture = pairer.released(400).unwrap();
        assert_eq!(gesture.down, Point::new(10, 10));
        assert_eq!(gesture.up, Point::new(300, 10));
        assert_eq!(gesture.duration_ms(), 300);
    }

    #[test]
    fn test_release_without_press() {
        let mut pairer = PointerPairer::new();
        assert!(pairer.released(10).is_none());
        pairer.pressed(20);
        assert!(pairer.released(30).is_some());
        assert!(pairer.released(40).is_none());
    }

    #[test]
    fn test_second_press_restarts() {
        let mut pairer = PointerPairer::new();
        pairer.moved(Point::new(1, 1));
        pairer.pressed(0);
        pairer.moved(Point::new(2, 2));
        pairer.pressed(50);
        let gesture = pairer.released(60).unwrap();
        assert_eq!(gesture.down, Point::new(2, 2));
        assert_eq!(gesture.down_ms, 50);
    }
}
