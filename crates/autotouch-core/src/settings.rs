//! Global jitter settings and the providers the engine reads them from.

use crate::storage::{get_settings_path, StorageResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

/// Process-wide randomization configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub randomization_enabled: bool,
    pub click_offset_radius_px: u32,
    pub click_duration_variance_ms: u64,
    pub delay_variance_ms: u64,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            randomization_enabled: false,
            click_offset_radius_px: 10,
            click_duration_variance_ms: 50,
            delay_variance_ms: 100,
        }
    }
}

/// Read-only source of settings snapshots.
///
/// The scheduler takes a fresh snapshot at the start of every pass, so
/// changes made while a script loops are picked up on the next pass.
pub trait SettingsProvider: Send + Sync {
    fn snapshot(&self) -> GlobalSettings;
}

/// Settings held in memory only.
#[derive(Debug, Default)]
pub struct InMemorySettings {
    current: RwLock<GlobalSettings>,
}

impl InMemorySettings {
    pub fn new(settings: GlobalSettings) -> Self {
        Self {
            current: RwLock::new(settings),
        }
    }

    pub fn set(&self, settings: GlobalSettings) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }
}

impl SettingsProvider for InMemorySettings {
    fn snapshot(&self) -> GlobalSettings {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Settings persisted as YAML. Every update is written through immediately.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<GlobalSettings>,
}

impl SettingsStore {
    /// Open the store at `path`. A missing file yields defaults.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let current = if path.exists() {
            let yaml = fs::read_to_string(&path)?;
            let settings: GlobalSettings = serde_yaml::from_str(&yaml)?;
            debug!(?path, "Loaded settings");
            settings
        } else {
            GlobalSettings::default()
        };
        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    /// Open the store in the app data directory.
    pub fn open_default() -> StorageResult<Self> {
        Self::open(get_settings_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn update_randomization_enabled(&self, enabled: bool) -> StorageResult<()> {
        self.update(|s| s.randomization_enabled = enabled)
    }

    pub fn update_click_offset_radius(&self, radius_px: u32) -> StorageResult<()> {
        self.update(|s| s.click_offset_radius_px = radius_px)
    }

    pub fn update_click_duration_variance(&self, variance_ms: u64) -> StorageResult<()> {
        self.update(|s| s.click_duration_variance_ms = variance_ms)
    }

    pub fn update_delay_variance(&self, variance_ms: u64) -> StorageResult<()> {
        self.update(|s| s.delay_variance_ms = variance_ms)
    }

    fn update(&self, apply: impl FnOnce(&mut GlobalSettings)) -> StorageResult<()> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = *guard;
        apply(&mut next);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_yaml::to_string(&next)?)?;
        *guard = next;

        info!(path = ?self.path, "Saved settings");
        Ok(())
    }
}

impl SettingsProvider for SettingsStore {
    fn snapshot(&self) -> GlobalSettings {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}
