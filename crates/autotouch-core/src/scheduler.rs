//! Playback scheduler: runs a script's actions on a coordinating thread.
//!
//! One run is active per executor. Starting a new run cancels the old one
//! without waiting for it; the old thread notices at its next cancellation
//! point and exits quietly.
//!
//! Settings are snapshotted at the start of every pass and the script at
//! `start`. Edits made while a run loops only show up at those points.

use crate::dispatcher::{GestureDispatcher, StrokeSink};
use crate::jitter::{Jitter, JitterBounds};
use crate::settings::{GlobalSettings, SettingsProvider};
use crate::Script;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shortest pass of a script that loops until stopped. Faster passes wait
/// out the remainder on the cancel token.
const MIN_LOOP_PASS: Duration = Duration::from_millis(10);

/// Cooperative cancellation flag that can also wake a sleeping waiter.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    cancelled: AtomicBool,
    // Never sent on; dropping it disconnects `signal` and wakes every waiter.
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                signal: rx,
            }),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let trigger = self
            .inner
            .trigger
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(trigger);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` or until cancelled. Returns true if the full
    /// duration elapsed without cancellation.
    pub fn wait(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        match self.inner.signal.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => !self.is_cancelled(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Executor-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Running,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// All requested passes ran.
    Completed,
    /// `stop()` was called or a newer run replaced this one.
    Cancelled,
    /// The coordinating thread panicked.
    Failed,
}

/// Outcome of one `start`, handed to the completion callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: u64,
    pub script_id: String,
    pub reason: StopReason,
    pub passes_completed: u64,
    pub gestures_dispatched: u64,
    pub dispatches_rejected: u64,
    pub waits_completed: u64,
}

/// Events emitted by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlaybackEvent {
    StateChanged { old: PlaybackState, new: PlaybackState },
    PassStarted { run_id: u64, pass: u64 },
    ActionStarting { run_id: u64, index: usize, kind: String },
    ActionCompleted { run_id: u64, index: usize },
    DispatchRejected { run_id: u64, index: usize },
    PassCompleted { run_id: u64, pass: u64 },
    Finished(RunSummary),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Emit per-action events in addition to pass and state events.
    pub emit_action_events: bool,
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            emit_action_events: true,
            event_capacity: 256,
        }
    }
}

type CompletionCallback = Box<dyn FnOnce(&RunSummary) + Send + 'static>;

/// The active run.
struct RunHandle {
    id: u64,
    cancel: CancelToken,
    finished: Arc<AtomicBool>,
}

impl RunHandle {
    fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.finished.load(Ordering::SeqCst)
    }
}

struct Shared<S> {
    dispatcher: GestureDispatcher<S>,
    settings: Arc<dyn SettingsProvider>,
    jitter: Arc<Jitter>,
    config: SchedulerConfig,
    current: Mutex<Option<RunHandle>>,
    event_tx: Sender<PlaybackEvent>,
}

impl<S> Shared<S> {
    fn emit(&self, event: PlaybackEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            debug!("dropping playback event: {}", e);
        }
    }
}

/// Plays scripts through a host stroke sink.
pub struct ScriptExecutor<S: StrokeSink + 'static> {
    shared: Arc<Shared<S>>,
    event_rx: Receiver<PlaybackEvent>,
    next_run_id: AtomicU64,
}

impl<S: StrokeSink + 'static> ScriptExecutor<S> {
    pub fn new(
        sink: S,
        settings: Arc<dyn SettingsProvider>,
        jitter: Arc<Jitter>,
        config: SchedulerConfig,
    ) -> Self {
        let (event_tx, event_rx) = bounded(config.event_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                dispatcher: GestureDispatcher::new(sink),
                settings,
                jitter,
                config,
                current: Mutex::new(None),
                event_tx,
            }),
            event_rx,
            next_run_id: AtomicU64::new(1),
        }
    }

    /// Cancel any current run and start `script`. `on_complete` runs exactly
    /// once when this run ends, whatever the reason. Returns the run id.
    pub fn start<F>(&self, script: Script, on_complete: F) -> u64
    where
        F: FnOnce(&RunSummary) + Send + 'static,
    {
        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancelToken::new();
        let finished = Arc::new(AtomicBool::new(false));

        let was_running = {
            let mut current = self.shared.current.lock().unwrap_or_else(|e| e.into_inner());
            let was_running = current.as_ref().map(RunHandle::is_active).unwrap_or(false);
            if let Some(old) = current.take() {
                debug!(old_run = old.id, new_run = run_id, "replacing active run");
                old.cancel.cancel();
            }
            *current = Some(RunHandle {
                id: run_id,
                cancel: cancel.clone(),
                finished: finished.clone(),
            });
            was_running
        };

        if !was_running {
            self.shared.emit(PlaybackEvent::StateChanged {
                old: PlaybackState::Idle,
                new: PlaybackState::Running,
            });
        }

        info!(
            run_id,
            script = %script.name,
            loop_count = script.loop_count,
            actions = script.actions.len(),
            "Playback started"
        );

        let run = Run {
            id: run_id,
            shared: self.shared.clone(),
            cancel,
        };
        let guard = CompletionGuard {
            shared: self.shared.clone(),
            finished,
            summary: RunSummary {
                run_id,
                script_id: script.id.clone(),
                reason: StopReason::Failed,
                passes_completed: 0,
                gestures_dispatched: 0,
                dispatches_rejected: 0,
                waits_completed: 0,
            },
            on_complete: Some(Box::new(on_complete)),
        };

        // On failure the closure and its guard are dropped, so the callback
        // has already fired with `Failed`.
        if let Err(e) = thread::Builder::new()
            .name(format!("autotouch-run-{run_id}"))
            .spawn(move || run.execute(&script, guard))
        {
            error!(run_id, error = %e, "failed to spawn playback thread");
        }

        run_id
    }

    /// Request cancellation of the current run. Does not wait.
    pub fn stop(&self) {
        let current = self.shared.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = current.as_ref() {
            if !handle.cancel.is_cancelled() {
                info!(run_id = handle.id, "Playback stop requested");
            }
            handle.cancel.cancel();
        }
    }

    /// True while a run exists that has neither been cancelled nor finished.
    pub fn is_running(&self) -> bool {
        self.shared
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(RunHandle::is_active)
            .unwrap_or(false)
    }

    pub fn state(&self) -> PlaybackState {
        if self.is_running() {
            PlaybackState::Running
        } else {
            PlaybackState::Idle
        }
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Option<PlaybackEvent> {
        self.event_rx.try_recv().ok()
    }
}

impl<S: StrokeSink + 'static> Drop for ScriptExecutor<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of one run, executed on its own thread.
struct Run<S> {
    id: u64,
    shared: Arc<Shared<S>>,
    cancel: CancelToken,
}

impl<S: StrokeSink> Run<S> {
    fn execute(self, script: &Script, mut guard: CompletionGuard<S>) {
        let mut pass = 0u64;
        let loop_forever = script.loop_count == 0;

        let reason = loop {
            if !loop_forever && pass >= u64::from(script.loop_count) {
                break StopReason::Completed;
            }
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            pass = pass.saturating_add(1);
            let pass_started = Instant::now();
            self.shared.emit(PlaybackEvent::PassStarted { run_id: self.id, pass });

            let settings = self.shared.settings.snapshot();
            if !self.run_once(script, &settings, &mut guard.summary) {
                break StopReason::Cancelled;
            }

            guard.summary.passes_completed = pass;
            self.shared.emit(PlaybackEvent::PassCompleted { run_id: self.id, pass });

            if loop_forever {
                if let Some(rest) = MIN_LOOP_PASS.checked_sub(pass_started.elapsed()) {
                    self.cancel.wait(rest);
                }
            }
        };

        guard.summary.reason = reason;
    }

    /// Execute every action once. Returns false if cancelled midway.
    fn run_once(&self, script: &Script, settings: &GlobalSettings, summary: &mut RunSummary) -> bool {
        let emit_actions = self.shared.config.emit_action_events;

        for (index, action) in script.actions.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return false;
            }

            let bounds = JitterBounds::resolve(action, script, settings);
            let (geometry, duration_ms) = self.shared.jitter.apply(action, &bounds);

            if emit_actions {
                self.shared.emit(PlaybackEvent::ActionStarting {
                    run_id: self.id,
                    index,
                    kind: action.kind.name().to_string(),
                });
            }

            if action.is_delay() {
                debug!(run_id = self.id, index, duration_ms, "waiting");
                if !self.cancel.wait(Duration::from_millis(duration_ms)) {
                    return false;
                }
                summary.waits_completed += 1;
            } else if self.shared.dispatcher.dispatch(&geometry, duration_ms) {
                summary.gestures_dispatched += 1;
            } else {
                warn!(run_id = self.id, index, "dispatch rejected, continuing");
                summary.dispatches_rejected += 1;
                self.shared.emit(PlaybackEvent::DispatchRejected { run_id: self.id, index });
            }

            if emit_actions {
                self.shared.emit(PlaybackEvent::ActionCompleted { run_id: self.id, index });
            }
        }

        true
    }
}

/// Fires the completion callback exactly once, including on panic.
struct CompletionGuard<S> {
    shared: Arc<Shared<S>>,
    finished: Arc<AtomicBool>,
    summary: RunSummary,
    on_complete: Option<CompletionCallback>,
}

impl<S> Drop for CompletionGuard<S> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(run_id = self.summary.run_id, "playback thread panicked");
            self.summary.reason = StopReason::Failed;
        }

        self.finished.store(true, Ordering::SeqCst);

        // Only the current run moves the executor back to idle.
        let was_current = self
            .shared
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|h| h.id == self.summary.run_id)
            .unwrap_or(false);

        info!(
            run_id = self.summary.run_id,
            reason = ?self.summary.reason,
            passes = self.summary.passes_completed,
            dispatched = self.summary.gestures_dispatched,
            rejected = self.summary.dispatches_rejected,
            "Playback finished"
        );

        if was_current {
            self.shared.emit(PlaybackEvent::StateChanged {
                old: PlaybackState::Running,
                new: PlaybackState::Idle,
            });
        }
        self.shared.emit(PlaybackEvent::Finished(self.summary.clone()));

        if let Some(callback) = self.on_complete.take() {
            callback(&self.summary);
        }
    }
}
