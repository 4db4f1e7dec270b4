//! autotouch-platform: host I/O adapters for autotouch.
//!
//! - `injector` replays strokes through `enigo`
//! - `input_hook` pairs global button press/release events from `rdev`
//!   into pointer gestures for recording

mod error;
mod injector;
mod input_hook;

pub use error::{PlatformError, PlatformResult};
pub use injector::{stroke_timeline, EnigoStrokeSink, NoopStrokeSink, MOVE_STEP_MS};
pub use input_hook::{start_pointer_hook, PointerHookHandle, PointerPairer};
