//! Script storage on disk and YAML import/export.

use crate::repository::{sort_by_name, ScriptRepository, Watchers};
use crate::validation::{validate_script, ValidationError};
use crate::Script;
use crossbeam_channel::Receiver;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Script not found: {0}")]
    NotFound(String),
    #[error("Invalid script: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Reject a script that fails validation.
pub(crate) fn ensure_valid(script: &Script) -> StorageResult<()> {
    validate_script(script).map_err(StorageError::Invalid)
}

/// Get the app data directory for autotouch.
pub fn get_app_data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("autotouch")
}

/// Get the scripts directory.
pub fn get_scripts_dir() -> PathBuf {
    get_app_data_dir().join("scripts")
}

/// Get the settings file path.
pub fn get_settings_path() -> PathBuf {
    get_app_data_dir().join("settings.yaml")
}

/// Scripts stored as one pretty-printed JSON file per id.
pub struct JsonScriptStore {
    dir: PathBuf,
    watchers: Watchers,
}

impl JsonScriptStore {
    /// Open a store rooted at `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!(?dir, "Created scripts directory");
        }
        Ok(Self {
            dir,
            watchers: Watchers::default(),
        })
    }

    /// Open the store in the app data directory.
    pub fn open_default() -> StorageResult<Self> {
        Self::open(get_scripts_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_filename(id)))
    }

    fn write(&self, script: &Script) -> StorageResult<()> {
        let path = self.path_for(&script.id);
        let json = serde_json::to_string_pretty(script)?;
        fs::write(&path, json)?;
        info!(?path, name = %script.name, "Saved script");
        Ok(())
    }

    fn publish(&self) {
        match self.list_all() {
            Ok(all) => self.watchers.publish(&all),
            Err(e) => warn!(error = %e, "failed to reload scripts for watchers"),
        }
    }
}

impl ScriptRepository for JsonScriptStore {
    fn get_by_id(&self, id: &str) -> StorageResult<Option<Script>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        let script: Script = serde_json::from_str(&json)?;
        debug!(?path, "Loaded script");
        Ok(Some(script))
    }

    fn insert(&self, script: &Script) -> StorageResult<()> {
        ensure_valid(script)?;
        self.write(script)?;
        self.publish();
        Ok(())
    }

    fn update(&self, script: &Script) -> StorageResult<()> {
        ensure_valid(script)?;
        if !self.path_for(&script.id).exists() {
            return Err(StorageError::NotFound(script.id.clone()));
        }
        self.write(script)?;
        self.publish();
        Ok(())
    }

    fn delete(&self, id: &str) -> StorageResult<()> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        fs::remove_file(&path)?;
        info!(?path, "Deleted script");
        self.publish();
        Ok(())
    }

    fn list_all(&self) -> StorageResult<Vec<Script>> {
        let mut scripts = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let json = fs::read_to_string(&path)?;
                match serde_json::from_str::<Script>(&json) {
                    Ok(script) => scripts.push(script),
                    Err(e) => warn!(?path, error = %e, "skipping unreadable script"),
                }
            }
        }
        sort_by_name(&mut scripts);
        Ok(scripts)
    }

    fn watch_all(&self) -> Receiver<Vec<Script>> {
        let current = self.list_all().unwrap_or_default();
        self.watchers.subscribe(&current, false)
    }

    fn watch_enabled(&self) -> Receiver<Vec<Script>> {
        let current = self.list_all().unwrap_or_default();
        self.watchers.subscribe(&current, true)
    }
}

/// Serialize a script to YAML for sharing.
pub fn export_script_yaml(script: &Script) -> StorageResult<String> {
    Ok(serde_yaml::to_string(script)?)
}

/// Parse and validate a shared script.
///
/// The imported script gets a fresh id so it never overwrites a local one.
pub fn import_script_yaml(yaml: &str) -> StorageResult<Script> {
    let mut script: Script = serde_yaml::from_str(yaml)?;
    ensure_valid(&script)?;
    script.id = crate::new_script_id();
    Ok(script)
}

/// Sanitize an id to be a valid filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '.' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, Point};

    fn temp_store(tag: &str) -> JsonScriptStore {
        let dir = std::env::temp_dir().join(format!("autotouch-{}-{}", tag, crate::new_script_id()));
        JsonScriptStore::open(dir).unwrap()
    }

    fn sample(name: &str) -> Script {
        Script::new(name).with_actions(vec![
            Action::click(Point::new(10, 20), 50),
            Action::delay(300),
            Action::swipe(Point::new(0, 0), Point::new(0, 400), 250),
        ])
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("abc-123"), "abc-123");
        assert_eq!(sanitize_filename("../evil"), "___evil");
        assert_eq!(sanitize_filename("a:b*c?d"), "a_b_c_d");
    }

    #[test]
    fn test_json_store_roundtrip() {
        let store = temp_store("roundtrip");
        let script = sample("Farm");
        store.insert(&script).unwrap();

        let loaded = store.get_by_id(&script.id).unwrap().unwrap();
        assert_eq!(loaded, script);
        assert!(store.get_by_id("nope").unwrap().is_none());

        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_json_store_list_and_delete() {
        let store = temp_store("list");
        let b = sample("beta");
        let a = sample("alpha");
        store.insert(&b).unwrap();
        store.insert(&a).unwrap();

        let names: Vec<_> = store.list_all().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["alpha", "beta"]);

        store.delete(&a.id).unwrap();
        assert_eq!(store.list_all().unwrap().len(), 1);
        assert!(matches!(store.delete(&a.id), Err(StorageError::NotFound(_))));

        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_json_store_rejects_invalid() {
        let store = temp_store("invalid");
        let mut script = sample("ok");
        store.insert(&script).unwrap();

        script.push_action(Action::swipe(Point::new(0, 0), Point::new(9, 9), 0));
        assert!(matches!(store.update(&script), Err(StorageError::Invalid(_))));
        assert_eq!(store.get_by_id(&script.id).unwrap().unwrap().actions.len(), 3);

        let mut blank = sample("blank");
        blank.name = " ".into();
        assert!(matches!(store.insert(&blank), Err(StorageError::Invalid(_))));
        assert!(store.get_by_id(&blank.id).unwrap().is_none());

        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_json_store_watch() {
        let store = temp_store("watch");
        let rx = store.watch_enabled();
        assert!(rx.try_recv().unwrap().is_empty());

        let mut script = sample("shown");
        script.is_enabled = true;
        store.insert(&script).unwrap();
        assert_eq!(rx.try_recv().unwrap().len(), 1);

        store.set_enabled(&script.id, false).unwrap();
        assert!(rx.try_recv().unwrap().is_empty());

        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_yaml_import_assigns_new_id() {
        let script = sample("Shared");
        let yaml = export_script_yaml(&script).unwrap();
        let imported = import_script_yaml(&yaml).unwrap();
        assert_ne!(imported.id, script.id);
        assert_eq!(imported.actions, script.actions);
        assert_eq!(imported.name, "Shared");
    }

    #[test]
    fn test_yaml_import_rejects_invalid() {
        let mut script = sample("  ");
        script.name = "  ".into();
        let yaml = export_script_yaml(&script).unwrap();
        assert!(matches!(import_script_yaml(&yaml), Err(StorageError::Invalid(_))));
    }
}
