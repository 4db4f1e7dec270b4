//! Playback entry point keyed by script id.

use crate::dispatcher::StrokeSink;
use crate::repository::ScriptRepository;
use crate::scheduler::{RunSummary, ScriptExecutor};
use crate::storage::StorageError;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Script not found: {0}")]
    MissingScript(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Loads scripts from a repository and hands them to an executor.
pub struct PlaybackController<S: StrokeSink + 'static> {
    repository: Arc<dyn ScriptRepository>,
    executor: ScriptExecutor<S>,
}

impl<S: StrokeSink + 'static> PlaybackController<S> {
    pub fn new(repository: Arc<dyn ScriptRepository>, executor: ScriptExecutor<S>) -> Self {
        Self {
            repository,
            executor,
        }
    }

    /// Load `script_id` and start it, replacing any current run.
    ///
    /// An unknown id leaves the executor untouched; a run already in
    /// progress keeps going.
    pub fn play_by_id<F>(&self, script_id: &str, on_complete: F) -> Result<u64, PlaybackError>
    where
        F: FnOnce(&RunSummary) + Send + 'static,
    {
        let script = match self.repository.get_by_id(script_id)? {
            Some(script) => script,
            None => {
                warn!(script_id, "play requested for unknown script");
                return Err(PlaybackError::MissingScript(script_id.to_string()));
            }
        };
        Ok(self.executor.start(script, on_complete))
    }

    pub fn stop(&self) {
        self.executor.stop();
    }

    pub fn is_running(&self) -> bool {
        self.executor.is_running()
    }

    pub fn executor(&self) -> &ScriptExecutor<S> {
        &self.executor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::tests::RecordingSink;
    use crate::jitter::Jitter;
    use crate::repository::MemoryScriptStore;
    use crate::scheduler::{PlaybackState, SchedulerConfig, StopReason};
    use crate::settings::InMemorySettings;
    use crate::{Action, Point, Script};
    use crossbeam_channel::bounded;
    use std::time::Duration;

    fn controller(
        store: Arc<MemoryScriptStore>,
        sink: Arc<RecordingSink>,
    ) -> PlaybackController<Arc<RecordingSink>> {
        let executor = ScriptExecutor::new(
            sink,
            Arc::new(InMemorySettings::default()),
            Arc::new(Jitter::seeded(3)),
            SchedulerConfig::default(),
        );
        PlaybackController::new(store, executor)
    }

    #[test]
    fn test_missing_script_never_runs() {
        let controller = controller(
            Arc::new(MemoryScriptStore::new()),
            Arc::new(RecordingSink::default()),
        );
        let result = controller.play_by_id("ghost", |_| panic!("callback must not fire"));
        assert!(matches!(result, Err(PlaybackError::MissingScript(id)) if id == "ghost"));
        assert!(!controller.is_running());
        assert_eq!(controller.executor().state(), PlaybackState::Idle);
        assert!(controller.executor().try_recv().is_none());
    }

    #[test]
    fn test_play_by_id() {
        let store = Arc::new(MemoryScriptStore::new());
        let sink = Arc::new(RecordingSink::default());
        let script = Script::new("stored")
            .with_loop_count(2)
            .with_actions(vec![Action::click(Point::new(40, 40), 50)]);
        store.insert(&script).unwrap();

        let controller = controller(store, sink.clone());
        let (tx, rx) = bounded(1);
        controller
            .play_by_id(&script.id, move |summary| {
                let _ = tx.send(summary.clone());
            })
            .unwrap();

        let summary = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(summary.script_id, script.id);
        assert_eq!(summary.reason, StopReason::Completed);
        assert_eq!(sink.strokes().len(), 2);
    }
}
