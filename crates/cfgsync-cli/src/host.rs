//! Host collaborators for a headless vault
//!
//! There is no running application to reload, so extension reloads and
//! host commands are recorded and reported instead of executed.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use cfgsync_core::{Adjudicator, HostApp, HostError, InstalledExtension, MergeSide};
use cfgsync_engine::RESTART_COMMAND;
use tracing::{debug, info, warn};

use crate::cli::MergePolicy;

const ENABLED_PLUGINS_FILE: &str = "community-plugins.json";

/// Host backed by the vault on disk
pub struct ConsoleHost {
    vault: PathBuf,
    config_dir: String,
    assume_yes: bool,
    restart_requested: AtomicBool,
}

impl ConsoleHost {
    pub fn new(vault: impl Into<PathBuf>, config_dir: impl Into<String>, assume_yes: bool) -> Self {
        Self {
            vault: vault.into(),
            config_dir: config_dir.into(),
            assume_yes,
            restart_requested: AtomicBool::new(false),
        }
    }

    /// Whether the engine asked for the application to be restarted
    pub fn restart_requested(&self) -> bool {
        self.restart_requested.load(Ordering::SeqCst)
    }

    async fn enabled_ids(&self) -> HashSet<String> {
        let path = self.vault.join(&self.config_dir).join(ENABLED_PLUGINS_FILE);
        let Ok(text) = tokio::fs::read_to_string(&path).await else {
            return HashSet::new();
        };
        match serde_json::from_str::<Vec<String>>(&text) {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable enabled plugin list");
                HashSet::new()
            }
        }
    }
}

#[async_trait]
impl HostApp for ConsoleHost {
    async fn installed_extensions(&self) -> Vec<InstalledExtension> {
        let enabled = self.enabled_ids().await;
        let plugins = self.vault.join(&self.config_dir).join("plugins");
        let Ok(mut entries) = tokio::fs::read_dir(&plugins).await else {
            return Vec::new();
        };

        let mut extensions = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let folder = entry.file_name().to_string_lossy().into_owned();
            let Ok(text) = tokio::fs::read_to_string(entry.path().join("manifest.json")).await
            else {
                continue;
            };
            let Ok(manifest) = serde_json::from_str::<serde_json::Value>(&text) else {
                debug!(plugin = %folder, "Skipping plugin with unreadable manifest");
                continue;
            };
            let id = manifest["id"].as_str().unwrap_or(&folder).to_string();
            let name = manifest["name"].as_str().unwrap_or(&id).to_string();
            extensions.push(InstalledExtension {
                enabled: enabled.contains(&id),
                dir: format!("{}/plugins/{}", self.config_dir, folder),
                id,
                name,
            });
        }
        extensions.sort_by(|a, b| a.id.cmp(&b.id));
        extensions
    }

    async fn unload_extension(&self, id: &str) -> Result<(), HostError> {
        debug!(extension = id, "Unload requested");
        Ok(())
    }

    async fn load_extension(&self, id: &str) -> Result<(), HostError> {
        info!(extension = id, "Plugin updated; it picks up the change on the next start");
        Ok(())
    }

    async fn execute_command(&self, command_id: &str) -> Result<(), HostError> {
        if command_id == RESTART_COMMAND {
            self.restart_requested.store(true, Ordering::SeqCst);
            println!("Restart the application to apply the new settings");
            Ok(())
        } else {
            Err(HostError::CommandFailed(command_id.to_string()))
        }
    }

    async fn ask_yes_no(&self, message: &str) -> bool {
        println!("{message} [{}]", if self.assume_yes { "yes" } else { "no" });
        self.assume_yes
    }

    fn notify(&self, message: &str) {
        println!("{message}");
    }
}

/// Resolves merges by a fixed policy
pub struct PolicyAdjudicator {
    policy: MergePolicy,
}

impl PolicyAdjudicator {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Adjudicator for PolicyAdjudicator {
    async fn resolve(
        &self,
        display_path: &str,
        left: &MergeSide,
        right: &MergeSide,
    ) -> Option<String> {
        let chosen = match self.policy {
            MergePolicy::Decline => None,
            MergePolicy::Left => Some(left),
            MergePolicy::Right => Some(right),
            MergePolicy::Newer if right.mtime > left.mtime => Some(right),
            MergePolicy::Newer => Some(left),
        };
        match chosen {
            Some(side) => {
                info!(file = display_path, from = %side.document_path, "Merge resolved");
                Some(side.content.clone())
            }
            None => {
                info!(file = display_path, "Merge declined");
                None
            }
        }
    }
}
