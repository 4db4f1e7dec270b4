//! rdev-based pointer hook.

use super::PointerPairer;
use autotouch_core::{Point, PointerGesture};
use crossbeam_channel::{Receiver, Sender};
use rdev::{listen, Button, Event, EventType};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Run the rdev listener on the current thread.
pub fn start_hook(gesture_tx: Sender<PointerGesture>, stop_rx: Receiver<()>) {
    info!("Pointer hook thread started (rdev)");
    let start_time = Instant::now();
    let mut pairer = PointerPairer::new();
    let mut stopped = false;

    let callback = move |event: Event| {
        if stopped || stop_rx.try_recv().is_ok() {
            stopped = true;
            return;
        }

        let timestamp_ms = start_time.elapsed().as_millis() as u64;

        match event.event_type {
            EventType::MouseMove { x, y } => {
                pairer.moved(Point::new(x.round() as i32, y.round() as i32));
            }
            EventType::ButtonPress(Button::Left) => pairer.pressed(timestamp_ms),
            EventType::ButtonRelease(Button::Left) => {
                if let Some(gesture) = pairer.released(timestamp_ms) {
                    debug!(?gesture, "pointer gesture");
                    if let Err(e) = gesture_tx.try_send(gesture) {
                        warn!("Failed to send pointer gesture: {}", e);
                    }
                }
            }
            _ => {}
        }
    };

    if let Err(error) = listen(callback) {
        error!(?error, "Pointer hook error");
    }

    info!("Pointer hook thread exiting");
}
