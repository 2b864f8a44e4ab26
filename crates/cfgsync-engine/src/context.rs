//! State shared by every engine component

use std::sync::Arc;

use cfgsync_core::{DocumentStore, HostApp, KeyDeriver, SettingsStore, StorageAdapter, SyncSettings};
use parking_lot::RwLock;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::schedule::{SerializedScopes, TaskScheduler};

/// Scope serializing list rebuilds and refreshes
pub(crate) const LIST_SCOPE: &str = "update-plugin-list";
/// Scope serializing merge adjudication
pub(crate) const MERGE_SCOPE: &str = "config:merge-data";
/// Scheduler name of full list rebuilds
pub(crate) const REBUILD_TASK: &str = "update-plugin-list-task";
/// Scheduler name of the restart prompt
pub(crate) const RESTART_PROMPT_TASK: &str = "config-reload";
/// Scheduler name of the arrival notice
pub(crate) const UPDATE_NOTICE_TASK: &str = "popup-updated-plugins";

/// Per-key scope shared by store and delete
pub(crate) fn artifact_scope(key: &str) -> String {
    format!("artifact:{key}")
}

/// Collaborators, settings and scheduling state
pub(crate) struct EngineContext {
    pub store: Arc<dyn DocumentStore>,
    pub storage: Arc<dyn StorageAdapter>,
    pub host: Arc<dyn HostApp>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub settings: RwLock<SyncSettings>,
    pub config: EngineConfig,
    pub scheduler: TaskScheduler,
    pub scopes: SerializedScopes,
}

impl EngineContext {
    /// The configured term, or the configuration-required error
    pub fn term(&self) -> EngineResult<String> {
        self.settings
            .read()
            .term()
            .map(str::to_string)
            .ok_or(EngineError::TermNotConfigured)
    }

    /// Whether customization sync is switched on
    pub fn sync_enabled(&self) -> bool {
        self.settings.read().use_plugin_sync
    }

    pub fn deriver(&self) -> KeyDeriver {
        KeyDeriver::new(self.settings.read().config_dir.clone())
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings.read().clone()
    }
}
