//! Script persistence boundary.

use crate::storage::{ensure_valid, StorageError, StorageResult};
use crate::Script;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Storage for scripts. The engine treats a script as one opaque aggregate.
pub trait ScriptRepository: Send + Sync {
    fn get_by_id(&self, id: &str) -> StorageResult<Option<Script>>;

    /// Insert, replacing any script with the same id. Invalid scripts are
    /// rejected with `StorageError::Invalid`.
    fn insert(&self, script: &Script) -> StorageResult<()>;

    /// Update an existing script. Fails with `NotFound` for unknown ids and
    /// `Invalid` for scripts that fail validation.
    fn update(&self, script: &Script) -> StorageResult<()>;

    fn delete(&self, id: &str) -> StorageResult<()>;

    /// All scripts ordered by name.
    fn list_all(&self) -> StorageResult<Vec<Script>>;

    /// Scripts whose shortcut is enabled, ordered by name.
    fn list_enabled(&self) -> StorageResult<Vec<Script>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|s| s.is_enabled)
            .collect())
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> StorageResult<()> {
        let mut script = self
            .get_by_id(id)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        script.is_enabled = enabled;
        self.update(&script)
    }

    /// Stream of the full list; receives the current list immediately and
    /// a fresh one after every mutation.
    fn watch_all(&self) -> Receiver<Vec<Script>>;

    /// Like `watch_all`, restricted to enabled scripts.
    fn watch_enabled(&self) -> Receiver<Vec<Script>>;
}

pub(crate) fn sort_by_name(scripts: &mut [Script]) {
    scripts.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

struct Watcher {
    tx: Sender<Vec<Script>>,
    enabled_only: bool,
}

/// Subscribers to list changes. Closed receivers are pruned on publish.
#[derive(Default)]
pub(crate) struct Watchers {
    inner: Mutex<Vec<Watcher>>,
}

impl Watchers {
    pub fn subscribe(&self, current: &[Script], enabled_only: bool) -> Receiver<Vec<Script>> {
        let (tx, rx) = unbounded();
        let _ = tx.send(filtered(current, enabled_only));
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Watcher { tx, enabled_only });
        rx
    }

    pub fn publish(&self, all: &[Script]) {
        let mut watchers = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        watchers.retain(|w| w.tx.send(filtered(all, w.enabled_only)).is_ok());
        debug!(subscribers = watchers.len(), "published script list");
    }
}

fn filtered(all: &[Script], enabled_only: bool) -> Vec<Script> {
    all.iter()
        .filter(|s| !enabled_only || s.is_enabled)
        .cloned()
        .collect()
}

/// Repository kept entirely in memory.
#[derive(Default)]
pub struct MemoryScriptStore {
    scripts: Mutex<HashMap<String, Script>>,
    watchers: Watchers,
}

impl MemoryScriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Vec<Script> {
        let mut all: Vec<Script> = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        sort_by_name(&mut all);
        all
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut HashMap<String, Script>) -> StorageResult<T>) -> StorageResult<T> {
        let result = {
            let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut scripts)?
        };
        self.watchers.publish(&self.snapshot());
        Ok(result)
    }
}

impl ScriptRepository for MemoryScriptStore {
    fn get_by_id(&self, id: &str) -> StorageResult<Option<Script>> {
        Ok(self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }

    fn insert(&self, script: &Script) -> StorageResult<()> {
        ensure_valid(script)?;
        self.mutate(|scripts| {
            scripts.insert(script.id.clone(), script.clone());
            Ok(())
        })
    }

    fn update(&self, script: &Script) -> StorageResult<()> {
        ensure_valid(script)?;
        self.mutate(|scripts| match scripts.get_mut(&script.id) {
            Some(slot) => {
                *slot = script.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(script.id.clone())),
        })
    }

    fn delete(&self, id: &str) -> StorageResult<()> {
        self.mutate(|scripts| {
            scripts
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| StorageError::NotFound(id.to_string()))
        })
    }

    fn list_all(&self) -> StorageResult<Vec<Script>> {
        Ok(self.snapshot())
    }

    fn watch_all(&self) -> Receiver<Vec<Script>> {
        self.watchers.subscribe(&self.snapshot(), false)
    }

    fn watch_enabled(&self) -> Receiver<Vec<Script>> {
        self.watchers.subscribe(&self.snapshot(), true)
    }
}
