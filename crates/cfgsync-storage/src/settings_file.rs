//! File-backed settings persistence

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cfgsync_core::{SettingsError, SettingsStore, SyncSettings};
use tracing::debug;

/// Persists [`SyncSettings`] as pretty JSON at a fixed path
#[derive(Debug, Clone)]
pub struct JsonSettingsFile {
    path: PathBuf,
}

impl JsonSettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings; a missing file yields the defaults
    pub async fn load(&self) -> Result<SyncSettings, SettingsError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "No settings file, using defaults");
                Ok(SyncSettings::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsFile {
    async fn save(&self, settings: &SyncSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, text).await?;
        debug!(path = ?self.path, "Saved settings");
        Ok(())
    }
}
