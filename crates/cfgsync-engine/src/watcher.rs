//! Reaction to raw file-change events

use std::collections::VecDeque;
use std::sync::Arc;

use cfgsync_core::FileKind;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::artifact_store::ArtifactStore;
use crate::context::EngineContext;

/// What happened to a raw file event
#[derive(Debug)]
pub enum WatchOutcome {
    /// Sync disabled, not a sync target, or not a regular file
    Ignored,
    /// Handed to another sync mechanism by the sync-mode table
    Excluded,
    /// Same path and second as a recent event; most likely our own write
    Suppressed,
    /// Forwarded to the artifact store in the background
    Forwarded(JoinHandle<()>),
}

impl WatchOutcome {
    /// Whether this engine took responsibility for the event
    pub fn is_handled(&self) -> bool {
        matches!(self, WatchOutcome::Suppressed | WatchOutcome::Forwarded(_))
    }

    /// Wait for a forwarded store to finish
    pub async fn settled(self) {
        if let WatchOutcome::Forwarded(handle) = self
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Forwarded store task failed");
        }
    }
}

/// Filters raw file events and forwards the rest to the artifact store
pub struct ChangeWatcher {
    ctx: Arc<EngineContext>,
    artifacts: Arc<ArtifactStore>,
    /// `<path>-<mtime seconds>`, most recent first
    recent: Mutex<VecDeque<String>>,
}

impl ChangeWatcher {
    pub(crate) fn new(ctx: Arc<EngineContext>, artifacts: Arc<ArtifactStore>) -> Self {
        Self {
            ctx,
            artifacts,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    /// Remember an event key; `false` when it was already recent
    fn remember(&self, key: String) -> bool {
        let mut recent = self.recent.lock();
        if recent.contains(&key) {
            return false;
        }
        recent.push_front(key);
        recent.truncate(self.ctx.config.recent_events_capacity);
        true
    }

    pub async fn on_raw_file_event(&self, path: &str) -> WatchOutcome {
        if !self.ctx.sync_enabled() {
            return WatchOutcome::Ignored;
        }
        if !self.ctx.deriver().is_target_path(path) {
            return WatchOutcome::Ignored;
        }

        let stat = match self.ctx.storage.stat(path).await {
            Ok(stat) => stat,
            Err(e) => {
                debug!(path, error = %e, "Could not stat changed file");
                None
            }
        };
        if stat.is_some_and(|s| s.kind != FileKind::File) {
            return WatchOutcome::Ignored;
        }

        let lowered = path.to_lowercase();
        let excluded = self
            .ctx
            .settings
            .read()
            .non_selective_paths()
            .iter()
            .any(|file| file.starts_with(&lowered));
        if excluded {
            debug!(path, "Customization file skipped");
            return WatchOutcome::Excluded;
        }

        let seconds = (stat.map(|s| s.mtime).unwrap_or(0.0) / 1000.0).trunc() as i64;
        if !self.remember(format!("{path}-{seconds}")) {
            trace!(path, "Recently processed, likely caused by our own write");
            return WatchOutcome::Suppressed;
        }

        let artifacts = Arc::clone(&self.artifacts);
        let path = path.to_string();
        WatchOutcome::Forwarded(tokio::spawn(async move {
            if let Err(e) = artifacts.store_customization_files(&path, None).await {
                warn!(path = %path, error = %e, "Could not store changed customization");
            }
        }))
    }
}
