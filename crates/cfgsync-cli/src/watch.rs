//! File-system events for the configuration folder

use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Vault-relative, `/`-separated form of `path`
pub fn vault_relative(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Watches the configuration folder, yielding vault-relative paths
pub struct ConfigFolderWatcher {
    // Dropping the watcher stops the events
    _watcher: RecommendedWatcher,
    changes: mpsc::UnboundedReceiver<String>,
}

impl ConfigFolderWatcher {
    pub fn start(vault: &Path, config_dir: &str) -> Result<Self> {
        let root: PathBuf = vault.canonicalize()?;
        let watched = root.join(config_dir);
        let (tx, changes) = mpsc::unbounded_channel();

        let event_root = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                for path in event.paths {
                    if let Some(relative) = vault_relative(&event_root, &path)
                        && let Err(e) = tx.send(relative)
                    {
                        warn!("Failed to send file change event: {}", e);
                    }
                }
            }
            Err(e) => error!("File watcher error: {}", e),
        })?;

        watcher.watch(&watched, RecursiveMode::Recursive)?;
        info!("Started watching customizations in: {}", watched.display());

        Ok(Self {
            _watcher: watcher,
            changes,
        })
    }

    /// Next changed path; `None` once the watcher has stopped
    pub async fn next(&mut self) -> Option<String> {
        self.changes.recv().await
    }
}
