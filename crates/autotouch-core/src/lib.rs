//! autotouch-core: action model, gesture recognition and playback scheduling.
//!
//! Design goal: keep this crate UI-agnostic and platform-agnostic.
//! Host I/O (stroke injection, pointer hooks) lives in `autotouch-platform`
//! and reaches the core only through the traits exported here.

mod controller;
mod dispatcher;
mod jitter;
mod recognizer;
mod recording;
mod repository;
mod scheduler;
mod settings;
mod storage;
mod validation;

pub use controller::{PlaybackController, PlaybackError};
pub use dispatcher::{GestureDispatcher, Stroke, StrokeSink};
pub use jitter::{Jitter, JitterBounds, CLICK_MIN_DURATION_MS, PRESS_MIN_DURATION_MS};
pub use recognizer::{
    classify, maybe_insert_delay, PointerGesture, RecognizerConfig, CLICK_DURATION_MS,
    LONG_PRESS_THRESHOLD_MS, MIN_DELAY_MS, MIN_SWIPE_DURATION_MS, MOVEMENT_THRESHOLD_PX,
};
pub use recording::{RecorderConfig, RecordingEvent, RecordingSession, RecordingState};
pub use repository::{MemoryScriptStore, ScriptRepository};
pub use scheduler::{
    CancelToken, PlaybackEvent, PlaybackState, RunSummary, SchedulerConfig, ScriptExecutor,
    StopReason,
};
pub use settings::{GlobalSettings, InMemorySettings, SettingsProvider, SettingsStore};
pub use storage::{
    export_script_yaml, get_app_data_dir, get_scripts_dir, get_settings_path, import_script_yaml,
    JsonScriptStore, StorageError, StorageResult,
};
pub use validation::{validate_script, ValidationError, ValidationResult};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Screen coordinate in device pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = f64::from(other.x) - f64::from(self.x);
        let dy = f64::from(other.y) - f64::from(self.y);
        (dx * dx + dy * dy).sqrt()
    }
}

/// What an action does, together with the geometry it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Short tap at a point.
    Click { at: Point },
    /// Press and hold at a point.
    LongPress { at: Point },
    /// Straight-line drag between two points.
    Swipe { from: Point, to: Point },
    /// Multi-pointer gesture. Replays as a no-op.
    MultiTouch { at: Point },
    /// Pure wait; `duration_ms` is the wait time.
    Delay,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::LongPress { .. } => "long_press",
            Self::Swipe { .. } => "swipe",
            Self::MultiTouch { .. } => "multi_touch",
            Self::Delay => "delay",
        }
    }
}

/// One step of a script.
///
/// Actions are values: editing a script replaces an action by index instead
/// of mutating it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    /// Press/swipe duration, or the wait time of a delay.
    pub duration_ms: u64,
    /// Legacy inter-action pause. Stored for compatibility, never replayed;
    /// pauses are explicit `Delay` actions.
    #[serde(default)]
    pub base_delay_ms: u64,
    #[serde(default)]
    pub description: String,
    /// Takes precedence over script and global offset radius.
    #[serde(default)]
    pub override_random_offset_px: Option<u32>,
    /// Takes precedence over script and global delay variance.
    #[serde(default)]
    pub override_random_delay_ms: Option<u64>,
}

impl Action {
    pub fn new(kind: ActionKind, duration_ms: u64) -> Self {
        Self {
            kind,
            duration_ms,
            base_delay_ms: 0,
            description: String::new(),
            override_random_offset_px: None,
            override_random_delay_ms: None,
        }
    }

    pub fn click(at: Point, duration_ms: u64) -> Self {
        Self::new(ActionKind::Click { at }, duration_ms)
    }

    pub fn long_press(at: Point, duration_ms: u64) -> Self {
        Self::new(ActionKind::LongPress { at }, duration_ms)
    }

    pub fn swipe(from: Point, to: Point, duration_ms: u64) -> Self {
        Self::new(ActionKind::Swipe { from, to }, duration_ms)
    }

    pub fn multi_touch(at: Point) -> Self {
        Self::new(ActionKind::MultiTouch { at }, 0)
    }

    pub fn delay(duration_ms: u64) -> Self {
        Self::new(ActionKind::Delay, duration_ms)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_offset_override(mut self, radius_px: u32) -> Self {
        self.override_random_offset_px = Some(radius_px);
        self
    }

    pub fn with_delay_override(mut self, variance_ms: u64) -> Self {
        self.override_random_delay_ms = Some(variance_ms);
        self
    }

    pub fn is_delay(&self) -> bool {
        matches!(self.kind, ActionKind::Delay)
    }
}

/// How a script's launcher shortcut is drawn. Opaque to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IconType {
    #[default]
    DefaultIcon,
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    pub icon_type: IconType,
    pub icon_data: String,
    pub screen_x: f32,
    pub screen_y: f32,
    pub alpha: f32,
    pub scale: f32,
    pub text_label: String,
    pub text_color: String,
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            icon_type: IconType::DefaultIcon,
            icon_data: String::new(),
            screen_x: 100.0,
            screen_y: 100.0,
            alpha: 0.6,
            scale: 0.8,
            text_label: String::new(),
            text_color: "#FFFFFF".into(),
        }
    }
}

/// A named, ordered list of actions plus loop and jitter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    pub name: String,
    /// Whether a launcher shortcut is shown for this script.
    #[serde(default)]
    pub is_enabled: bool,
    /// 0 runs until stopped; N > 0 runs exactly N passes.
    #[serde(default)]
    pub loop_count: u32,
    #[serde(default)]
    pub global_random_offset_px: Option<u32>,
    #[serde(default)]
    pub global_random_delay_ms: Option<u64>,
    #[serde(default)]
    pub shortcut_config: ShortcutConfig,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Script {
    /// Create an empty script with a freshly generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_script_id(),
            name: name.into(),
            is_enabled: false,
            loop_count: 1,
            global_random_offset_px: None,
            global_random_delay_ms: None,
            shortcut_config: ShortcutConfig::default(),
            actions: Vec::new(),
        }
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_loop_count(mut self, loop_count: u32) -> Self {
        self.loop_count = loop_count;
        self
    }

    /// Number of actions that touch the screen (delays excluded).
    pub fn gesture_count(&self) -> usize {
        self.actions.iter().filter(|a| !a.is_delay()).count()
    }

    pub fn push_action(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Replace the action at `index`. Returns the previous action.
    pub fn replace_action(&mut self, index: usize, action: Action) -> Option<Action> {
        let slot = self.actions.get_mut(index)?;
        Some(std::mem::replace(slot, action))
    }

    /// Insert before `index`; an index past the end appends.
    pub fn insert_action(&mut self, index: usize, action: Action) {
        let index = index.min(self.actions.len());
        self.actions.insert(index, action);
    }

    pub fn remove_action(&mut self, index: usize) -> Option<Action> {
        if index < self.actions.len() {
            Some(self.actions.remove(index))
        } else {
            None
        }
    }

    /// Move the action at `from` so it ends up at `to`.
    pub fn move_action(&mut self, from: usize, to: usize) -> bool {
        let len = self.actions.len();
        if from >= len || to >= len {
            return false;
        }
        let action = self.actions.remove(from);
        self.actions.insert(to, action);
        true
    }
}

/// Random 128-bit id rendered in the 8-4-4-4-12 hex layout.
pub fn new_script_id() -> String {
    let v: u128 = rand::rng().random();
    let hex = format!("{v:032x}");
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
