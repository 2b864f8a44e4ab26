//! User settings consumed by the sync engine
//!
//! Settings are persisted by an external collaborator ([`SettingsStore`]);
//! the JSON helpers here cover the common file-backed case.
//!
//! [`SettingsStore`]: crate::traits::SettingsStore

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// How files of one artifact are synchronized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Synchronized through the customization dialog, on request
    #[default]
    Selective,
    /// Synchronized automatically by the hidden-file mechanism
    Automatic,
    /// Not synchronized at all
    Paused,
}

/// Per-artifact entry of the sync-mode table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedSyncSetting {
    /// `CATEGORY/name`
    pub key: String,
    pub mode: SyncMode,
    /// Filenames (relative to the configuration root) observed for the artifact
    #[serde(default)]
    pub files: Vec<String>,
}

impl ExtendedSyncSetting {
    /// New selective entry with no files
    pub fn selective(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            mode: SyncMode::Selective,
            files: Vec::new(),
        }
    }
}

/// Settings for the customization sync engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Device and vault name; the term that namespaces this device's keys
    pub device_and_vault_name: String,
    /// Master switch
    pub use_plugin_sync: bool,
    /// Scan on start-up, resume and before replication
    pub auto_sweep_plugins: bool,
    /// Scan periodically
    pub auto_sweep_plugins_periodic: bool,
    /// Whether raw file events are being watched (disables the periodic sweep)
    pub watch_internal_file_changes: bool,
    /// Notify the user when customizations arrive from other devices
    pub notify_plugin_or_setting_updated: bool,
    /// Configuration root inside the vault
    pub config_dir: String,
    /// Interval of the periodic sweep
    pub periodic_sweep_interval_secs: u64,
    /// Whether the whole sync machinery is suspended
    pub suspended: bool,
    /// Sync-mode table keyed by `CATEGORY/name`
    pub plugin_sync_extended_setting: BTreeMap<String, ExtendedSyncSetting>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            device_and_vault_name: String::new(),
            use_plugin_sync: false,
            auto_sweep_plugins: false,
            auto_sweep_plugins_periodic: false,
            watch_internal_file_changes: false,
            notify_plugin_or_setting_updated: true,
            config_dir: ".obsidian".to_string(),
            periodic_sweep_interval_secs: 60,
            suspended: false,
            plugin_sync_extended_setting: BTreeMap::new(),
        }
    }
}

impl SyncSettings {
    /// Settings with sync enabled for the given term
    pub fn for_term(term: impl Into<String>) -> Self {
        Self {
            device_and_vault_name: term.into(),
            use_plugin_sync: true,
            ..Default::default()
        }
    }

    /// The configured term, if any
    pub fn term(&self) -> Option<&str> {
        Some(self.device_and_vault_name.as_str()).filter(|t| !t.is_empty())
    }

    /// Lower-cased physical paths handed to another sync mechanism
    /// (every file of an entry whose mode is not selective)
    pub fn non_selective_paths(&self) -> Vec<String> {
        self.plugin_sync_extended_setting
            .values()
            .filter(|entry| entry.mode != SyncMode::Selective)
            .flat_map(|entry| entry.files.iter())
            .map(|file| format!("{}/{}", self.config_dir, file).to_lowercase())
            .collect()
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save settings as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
