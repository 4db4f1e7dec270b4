//! Recording session: turns pointer gestures into a draft script.

use crate::dispatcher::{GestureDispatcher, StrokeSink};
use crate::recognizer::{PointerGesture, RecognizerConfig};
use crate::repository::ScriptRepository;
use crate::storage::{ensure_valid, StorageResult};
use crate::{Action, Point, Script};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info};

/// Configuration for a recording session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    #[serde(flatten)]
    pub recognizer: RecognizerConfig,
    /// Replay each recognized gesture through the attached sink.
    pub passthrough: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            recognizer: RecognizerConfig::default(),
            passthrough: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
}

/// Events emitted by the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecordingEvent {
    StateChanged { old: RecordingState, new: RecordingState },
    /// A gesture was recognized. `action_count` excludes delays.
    ActionRecorded { action_count: usize, kind: String },
    Saved { script: Script },
    Discarded,
}

/// Collects recognized actions between `start` and `save`/`discard`.
pub struct RecordingSession {
    config: RecorderConfig,
    state: RecordingState,
    actions: Vec<Action>,
    last_action_end_ms: u64,
    pending_down: Option<(Point, u64)>,
    passthrough: Option<GestureDispatcher<Arc<dyn StrokeSink>>>,
}

impl RecordingSession {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            state: RecordingState::Idle,
            actions: Vec::new(),
            last_action_end_ms: 0,
            pending_down: None,
            passthrough: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RecorderConfig::default())
    }

    /// Attach a sink used to replay gestures live while recording.
    pub fn with_passthrough(mut self, sink: Arc<dyn StrokeSink>) -> Self {
        self.passthrough = Some(GestureDispatcher::new(sink));
        self
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Number of recorded gestures, delays excluded.
    pub fn action_count(&self) -> usize {
        self.actions.iter().filter(|a| !a.is_delay()).count()
    }

    /// Start a new recording. Ignored unless idle.
    pub fn start(&mut self) -> Option<RecordingEvent> {
        if self.state != RecordingState::Idle {
            return None;
        }

        self.actions.clear();
        self.last_action_end_ms = 0;
        self.pending_down = None;
        info!("Recording started");
        Some(self.transition(RecordingState::Recording))
    }

    pub fn pointer_down(&mut self, at: Point, time_ms: u64) {
        if self.state == RecordingState::Recording {
            self.pending_down = Some((at, time_ms));
        }
    }

    /// Complete the gesture begun by the last `pointer_down`.
    pub fn pointer_up(&mut self, at: Point, time_ms: u64) -> Option<RecordingEvent> {
        let Some((down, down_ms)) = self.pending_down.take() else {
            debug!(?at, "pointer up without a matching down, ignored");
            return None;
        };
        self.record_gesture(PointerGesture {
            down,
            up: at,
            down_ms,
            up_ms: time_ms,
        })
    }

    /// Classify a complete gesture and append it, preceded by a delay when
    /// the pause since the previous gesture is long enough.
    pub fn record_gesture(&mut self, gesture: PointerGesture) -> Option<RecordingEvent> {
        if self.state != RecordingState::Recording {
            return None;
        }

        let recognizer = &self.config.recognizer;
        if let Some(delay) =
            recognizer.maybe_insert_delay(&self.actions, self.last_action_end_ms, gesture.down_ms)
        {
            debug!(duration_ms = delay.duration_ms, "inserted delay");
            self.actions.push(delay);
        }

        let action = recognizer.classify(gesture.down, gesture.up, gesture.down_ms, gesture.up_ms);
        self.last_action_end_ms = gesture.up_ms;
        debug!(kind = action.kind.name(), description = %action.description, "recorded gesture");

        if self.config.passthrough {
            if let Some(dispatcher) = &self.passthrough {
                dispatcher.dispatch_passthrough(&action);
            }
        }

        let kind = action.kind.name().to_string();
        self.actions.push(action);
        Some(RecordingEvent::ActionRecorded {
            action_count: self.action_count(),
            kind,
        })
    }

    /// Stop recording and persist the draft as a new script.
    ///
    /// A recording with no actions is discarded instead. Without a name the
    /// script is called "Recorded Script <unix-ms>". A draft that fails
    /// validation is not stored and stays in the session.
    pub fn save(
        &mut self,
        repository: &dyn ScriptRepository,
        name: Option<String>,
    ) -> StorageResult<RecordingEvent> {
        if self.actions.is_empty() {
            return Ok(self.discard());
        }

        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(default_script_name);
        let script = Script::new(name)
            .with_loop_count(1)
            .with_actions(self.actions.clone());
        ensure_valid(&script)?;
        repository.insert(&script)?;

        info!(id = %script.id, name = %script.name, actions = script.actions.len(), "Recording saved");
        self.reset();
        Ok(RecordingEvent::Saved { script })
    }

    /// Drop everything recorded so far and return to idle.
    pub fn discard(&mut self) -> RecordingEvent {
        info!(actions = self.actions.len(), "Recording discarded");
        self.reset();
        RecordingEvent::Discarded
    }

    fn reset(&mut self) {
        self.actions.clear();
        self.pending_down = None;
        self.last_action_end_ms = 0;
        self.state = RecordingState::Idle;
    }

    fn transition(&mut self, new: RecordingState) -> RecordingEvent {
        let old = self.state;
        self.state = new;
        RecordingEvent::StateChanged { old, new }
    }
}

fn default_script_name() -> String {
    let unix_ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("Recorded Script {unix_ms}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::tests::RecordingSink;
    use crate::dispatcher::Stroke;
    use crate::repository::MemoryScriptStore;
    use crate::ActionKind;

    fn recording() -> RecordingSession {
        let mut session = RecordingSession::with_defaults();
        session.start();
        session
    }

    #[test]
    fn test_click_delay_swipe() {
        let mut session = recording();
        session.pointer_down(Point::new(100, 100), 1_000);
        session.pointer_up(Point::new(102, 101), 1_080);
        session.pointer_down(Point::new(0, 0), 1_280);
        let event = session.pointer_up(Point::new(0, 300), 1_580);

        let kinds: Vec<_> = session.actions().iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            [
                ActionKind::Click { at: Point::new(100, 100) },
                ActionKind::Delay,
                ActionKind::Swipe { from: Point::new(0, 0), to: Point::new(0, 300) },
            ]
        );
        assert_eq!(session.actions()[1].duration_ms, 200);
        assert_eq!(session.actions()[2].duration_ms, 300);
        assert_eq!(session.action_count(), 2);
        assert!(matches!(
            event,
            Some(RecordingEvent::ActionRecorded { action_count: 2, .. })
        ));
    }

    #[test]
    fn test_short_gap_has_no_delay() {
        let mut session = recording();
        session.record_gesture(PointerGesture {
            down: Point::new(5, 5),
            up: Point::new(5, 5),
            down_ms: 0,
            up_ms: 40,
        });
        session.record_gesture(PointerGesture {
            down: Point::new(5, 5),
            up: Point::new(5, 5),
            down_ms: 90,
            up_ms: 130,
        });
        assert_eq!(session.actions().len(), 2);
        assert!(session.actions().iter().all(|a| !a.is_delay()));
    }

    #[test]
    fn test_ignored_when_idle() {
        let mut session = RecordingSession::with_defaults();
        session.pointer_down(Point::new(1, 1), 0);
        assert!(session.pointer_up(Point::new(1, 1), 10).is_none());
        assert!(session.actions().is_empty());

        session.start();
        assert!(session.start().is_none());
        assert!(session.pointer_up(Point::new(1, 1), 10).is_none());
    }

    #[test]
    fn test_passthrough() {
        let sink = Arc::new(RecordingSink::default());
        let mut session = RecordingSession::with_defaults().with_passthrough(sink.clone());
        session.start();
        session.pointer_down(Point::new(7, 8), 0);
        session.pointer_up(Point::new(7, 8), 200);
        session.pointer_down(Point::new(0, 0), 300);
        session.pointer_up(Point::new(500, 0), 5_300);

        assert_eq!(
            sink.strokes(),
            vec![
                Stroke::tap(Point::new(7, 8), 50),
                Stroke::line(Point::new(0, 0), Point::new(500, 0), 2_000),
            ]
        );
    }

    #[test]
    fn test_passthrough_disabled() {
        let sink = Arc::new(RecordingSink::default());
        let config = RecorderConfig {
            passthrough: false,
            ..RecorderConfig::default()
        };
        let mut session = RecordingSession::new(config).with_passthrough(sink.clone());
        session.start();
        session.pointer_down(Point::new(7, 8), 0);
        session.pointer_up(Point::new(7, 8), 20);
        assert!(sink.strokes().is_empty());
        assert_eq!(session.action_count(), 1);
    }

    #[test]
    fn test_save_defaults() {
        let store = MemoryScriptStore::new();
        let mut session = recording();
        session.pointer_down(Point::new(1, 1), 0);
        session.pointer_up(Point::new(1, 1), 900);

        let event = session.save(&store, None).unwrap();
        let RecordingEvent::Saved { script } = event else {
            panic!("expected saved event");
        };
        assert!(script.name.starts_with("Recorded Script "));
        assert_eq!(script.loop_count, 1);
        assert!(!script.is_enabled);
        assert!(matches!(script.actions[0].kind, ActionKind::LongPress { .. }));
        assert_eq!(store.get_by_id(&script.id).unwrap(), Some(script));
        assert_eq!(session.state(), RecordingState::Idle);
        assert!(session.actions().is_empty());
    }

    #[test]
    fn test_save_rejects_invalid_draft() {
        let store = MemoryScriptStore::new();
        let mut session = recording();
        session.pointer_down(Point::new(5_000_000, 10), 0);
        session.pointer_up(Point::new(5_000_000, 10), 40);

        let result = session.save(&store, Some("far away".into()));
        let Err(crate::StorageError::Invalid(errors)) = result else {
            panic!("expected validation failure");
        };
        assert_eq!(errors[0].path, "actions[0].kind.at.x");
        assert!(store.list_all().unwrap().is_empty());
        assert_eq!(session.state(), RecordingState::Recording);
        assert_eq!(session.action_count(), 1);
    }

    #[test]
    fn test_save_empty_discards() {
        let store = MemoryScriptStore::new();
        let mut session = recording();
        let event = session.save(&store, Some("nothing".into())).unwrap();
        assert!(matches!(event, RecordingEvent::Discarded));
        assert!(store.list_all().unwrap().is_empty());
        assert_eq!(session.state(), RecordingState::Idle);
    }

    #[test]
    fn test_config_yaml_flattened() {
        let config: RecorderConfig =
            serde_yaml::from_str("long_press_threshold_ms: 800\npassthrough: false\n").unwrap();
        assert_eq!(config.recognizer.long_press_threshold_ms, 800);
        assert_eq!(config.recognizer.min_delay_ms, 50);
        assert!(!config.passthrough);
    }
}
