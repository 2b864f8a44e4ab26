//! Observable index of known artifacts
//!
//! The index is a whole-list snapshot published through a `watch` channel:
//! every change builds a new list and replaces the old one, so observers
//! never see a partially updated list. Loads within a rebuild run
//! concurrently up to the configured limit; merging a loaded summary is
//! keyed by document path, so load order does not matter.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cfgsync_core::{
    ArtifactSummary, DocumentEntry, ExtendedSyncSetting, RangeQuery, SYNC_PREFIX, codec,
};
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::context::{EngineContext, LIST_SCOPE, REBUILD_TASK};
use crate::error::EngineResult;

/// Resets the enumerating flag when a rebuild ends, however it ends
struct EnumeratingGuard<'a>(&'a watch::Sender<bool>);

impl<'a> EnumeratingGuard<'a> {
    fn start(flag: &'a watch::Sender<bool>) -> Self {
        flag.send_replace(true);
        Self(flag)
    }
}

impl Drop for EnumeratingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

/// Maintains the observable artifact list
pub struct ListIndexer {
    ctx: Arc<EngineContext>,
    list: watch::Sender<Arc<Vec<ArtifactSummary>>>,
    enumerating: watch::Sender<bool>,
}

impl ListIndexer {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Arc<Self> {
        let (list, _) = watch::channel(Arc::new(Vec::new()));
        let (enumerating, _) = watch::channel(false);
        Arc::new(Self {
            ctx,
            list,
            enumerating,
        })
    }

    /// Current list snapshot
    pub fn current(&self) -> Arc<Vec<ArtifactSummary>> {
        self.list.borrow().clone()
    }

    /// Observe list changes
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<ArtifactSummary>>> {
        self.list.subscribe()
    }

    pub fn is_enumerating(&self) -> bool {
        *self.enumerating.borrow()
    }

    /// Observe the enumerating flag
    pub fn subscribe_enumerating(&self) -> watch::Receiver<bool> {
        self.enumerating.subscribe()
    }

    /// Find the indexed summary for a key
    pub fn get(&self, key: &str) -> Option<ArtifactSummary> {
        self.list
            .borrow()
            .iter()
            .find(|summary| summary.document_path == key)
            .cloned()
    }

    /// Empty the list
    pub fn clear(&self) {
        self.publish(Vec::new());
    }

    fn publish(&self, list: Vec<ArtifactSummary>) {
        self.list.send_replace(Arc::new(list));
    }

    /// Replace any entry with the same key by `summary`
    fn upsert(&self, summary: ArtifactSummary) {
        let mut next: Vec<ArtifactSummary> = self
            .current()
            .iter()
            .filter(|entry| entry.document_path != summary.document_path)
            .cloned()
            .collect();
        next.push(summary);
        self.publish(next);
    }

    /// Drop every entry whose key fails `keep`
    fn retain(&self, keep: impl Fn(&ArtifactSummary) -> bool) {
        let current = self.current();
        if current.iter().all(&keep) {
            return;
        }
        let next = current.iter().filter(|entry| keep(entry)).cloned().collect();
        self.publish(next);
    }

    /// Request a coalesced full rebuild
    pub fn request_rebuild(self: &Arc<Self>, show_message: bool) -> Option<JoinHandle<()>> {
        if !self.ctx.sync_enabled() {
            self.clear();
            return None;
        }
        let this = Arc::clone(self);
        Some(self.ctx.scheduler.schedule(
            REBUILD_TASK,
            self.ctx.config.list_debounce,
            move || async move {
                if let Err(e) = this.rebuild_now(show_message).await {
                    warn!(error = %e, "Failed to enumerate customizations");
                }
            },
        ))
    }

    /// Request a coalesced refresh of a single key
    pub fn request_refresh(self: &Arc<Self>, key: &str) -> Option<JoinHandle<()>> {
        if !self.ctx.sync_enabled() {
            self.clear();
            return None;
        }
        let this = Arc::clone(self);
        let key = key.to_string();
        Some(self.ctx.scheduler.schedule(
            format!("{REBUILD_TASK}:{key}"),
            self.ctx.config.list_debounce,
            move || async move {
                if let Err(e) = this.refresh_now(&key).await {
                    warn!(key = %key, error = %e, "Failed to refresh customization");
                }
            },
        ))
    }

    /// Clear the list, then request a full rebuild
    pub fn reload(self: &Arc<Self>, show_message: bool) -> Option<JoinHandle<()>> {
        self.clear();
        self.request_rebuild(show_message)
    }

    /// Load the display projection of a live document
    async fn load_summary(&self, key: &str) -> EngineResult<Option<ArtifactSummary>> {
        let Some(entry) = self.ctx.store.get(key, false).await? else {
            return Ok(None);
        };
        let bundle = codec::try_deserialize(&entry.data)?;
        Ok(Some(ArtifactSummary::from_bundle(&bundle, key)))
    }

    /// Whether the index already holds `entry` at the same modification time
    fn is_current(&self, entry: &DocumentEntry) -> bool {
        self.list
            .borrow()
            .iter()
            .any(|summary| summary.document_path == entry.path && summary.mtime == entry.mtime)
    }

    /// Enumerate every customization document and rebuild the list
    pub async fn rebuild_now(&self, show_message: bool) -> EngineResult<()> {
        {
            let _scope = self.ctx.scopes.lock(LIST_SCOPE).await;
            if !self.ctx.sync_enabled() {
                self.clear();
                return Ok(());
            }
            let _enumerating = EnumeratingGuard::start(&self.enumerating);

            let query = RangeQuery::prefix(SYNC_PREFIX).with_docs(false);
            let entries = self.ctx.store.find_entries(&query).await?;
            let live: HashSet<String> = entries.iter().map(|e| e.path.clone()).collect();
            let stale: Vec<DocumentEntry> = entries
                .into_iter()
                .filter(|entry| !self.is_current(entry))
                .collect();
            debug!(live = live.len(), stale = stale.len(), "Enumerating customizations");

            let count = AtomicUsize::new(0);
            let mut loads = futures::stream::iter(stale)
                .map(|entry| {
                    let count = &count;
                    async move {
                        let n = count.fetch_add(1, Ordering::SeqCst) + 1;
                        if n % 10 == 0 {
                            if show_message {
                                info!(count = n, "Enumerating files...");
                            } else {
                                debug!(count = n, "Enumerating files...");
                            }
                        }
                        trace!(key = %entry.path, "Loading customization");
                        (entry.path.clone(), self.load_summary(&entry.path).await)
                    }
                })
                .buffer_unordered(self.ctx.config.load_concurrency);

            while let Some((key, result)) = loads.next().await {
                match result {
                    Ok(Some(summary)) => self.upsert(summary),
                    Ok(None) => trace!(key = %key, "Customization vanished while enumerating"),
                    Err(e) => warn!(key = %key, error = %e, "Something happened at enumerating customization"),
                }
            }
            drop(loads);

            self.retain(|summary| live.contains(&summary.document_path));

            if show_message {
                info!("All files enumerated");
            } else {
                debug!("All files enumerated");
            }
        }

        self.reconcile_settings().await
    }

    /// Reload the entry of a single key, pruning it when it is gone
    pub async fn refresh_now(&self, key: &str) -> EngineResult<()> {
        let _scope = self.ctx.scopes.lock(LIST_SCOPE).await;
        if !self.ctx.sync_enabled() {
            self.clear();
            return Ok(());
        }

        let query = RangeQuery::key(key).with_docs(false);
        let found = self
            .ctx
            .store
            .find_entries(&query)
            .await?
            .into_iter()
            .find(|entry| entry.path == key);

        let Some(entry) = found else {
            trace!(key, "Customization gone, pruning");
            self.retain(|summary| summary.document_path != key);
            return Ok(());
        };
        if self.is_current(&entry) {
            return Ok(());
        }

        match self.load_summary(key).await {
            Ok(Some(summary)) => self.upsert(summary),
            Ok(None) => self.retain(|summary| summary.document_path != key),
            Err(e) => warn!(key, error = %e, "Something happened at enumerating customization"),
        }
        Ok(())
    }

    /// Bring the sync-mode table in line with the observed file sets
    async fn reconcile_settings(&self) -> EngineResult<()> {
        let list = self.current();
        let snapshot = {
            let mut settings = self.ctx.settings.write();
            let mut changed = false;
            for summary in list.iter() {
                let key = summary.settings_key();
                let entry = settings
                    .plugin_sync_extended_setting
                    .entry(key.clone())
                    .or_insert_with(|| {
                        changed = true;
                        ExtendedSyncSetting::selective(key)
                    });

                let mut observed: Vec<String> =
                    summary.files.iter().map(|f| f.filename.clone()).collect();
                observed.sort();
                let mut recorded = entry.files.clone();
                recorded.sort();
                if recorded.join(",").to_lowercase() != observed.join(",").to_lowercase() {
                    entry.files = observed;
                    changed = true;
                }
            }
            changed.then(|| settings.clone())
        };

        if let Some(settings) = snapshot {
            debug!("Sync-mode table changed, saving settings");
            self.ctx.settings_store.save(&settings).await?;
        }
        Ok(())
    }
}
