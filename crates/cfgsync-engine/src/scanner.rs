//! Full reconciliation pass between local files and the store

use std::collections::BTreeMap;
use std::sync::Arc;

use cfgsync_core::{FileKind, KeyDeriver, LogicalKey, RangeQuery, key_namespace};
use tracing::{debug, info, warn};

use crate::artifact_store::{ArtifactStore, StoreOutcome};
use crate::context::EngineContext;
use crate::error::EngineResult;
use crate::indexer::ListIndexer;

/// Folder never scanned
const TRASH_DIR: &str = ".trash";

/// Counts of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub stored: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl ScanReport {
    fn record(&mut self, outcome: StoreOutcome) {
        match outcome {
            StoreOutcome::Stored => self.stored += 1,
            StoreOutcome::Unchanged => self.unchanged += 1,
            StoreOutcome::Deleted => self.deleted += 1,
        }
    }
}

fn is_trash(path: &str) -> bool {
    path.split('/').any(|segment| segment == TRASH_DIR)
}

/// Walks the configuration root and reconciles this device's namespace
pub struct ReconciliationScanner {
    ctx: Arc<EngineContext>,
    artifacts: Arc<ArtifactStore>,
    indexer: Arc<ListIndexer>,
}

impl ReconciliationScanner {
    pub(crate) fn new(
        ctx: Arc<EngineContext>,
        artifacts: Arc<ArtifactStore>,
        indexer: Arc<ListIndexer>,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            artifacts,
            indexer,
        })
    }

    /// Every file under the configuration root, down to the scan depth
    pub async fn scan_internal_files(&self, deriver: &KeyDeriver) -> EngineResult<Vec<String>> {
        let root = deriver.config_dir();
        match self.ctx.storage.stat(root).await? {
            Some(stat) if stat.kind == FileKind::Folder => {}
            _ => {
                debug!(root, "Configuration folder not found");
                return Ok(Vec::new());
            }
        }

        let mut files = Vec::new();
        let mut pending = vec![(root.to_string(), self.ctx.config.scan_depth)];
        while let Some((dir, depth)) = pending.pop() {
            let listing = match self.ctx.storage.list(&dir).await {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(dir = %dir, error = %e, "Could not list folder");
                    continue;
                }
            };
            files.extend(listing.files.into_iter().filter(|f| !is_trash(f)));
            if depth > 0 {
                pending.extend(
                    listing
                        .folders
                        .into_iter()
                        .filter(|f| !is_trash(f))
                        .map(|folder| (folder, depth - 1)),
                );
            }
        }
        files.sort();
        Ok(files)
    }

    /// Store every locally present artifact and delete every stored
    /// artifact of this device that has no local files left
    pub async fn scan_all(&self, show_message: bool) -> EngineResult<ScanReport> {
        if show_message {
            info!("Scanning customizing files");
        } else {
            debug!("Scanning customizing files");
        }
        let term = self.ctx.term()?;
        let deriver = self.ctx.deriver();

        // One representative path per key; the siblings are derived from it
        let mut local: BTreeMap<LogicalKey, String> = BTreeMap::new();
        for path in self.scan_internal_files(&deriver).await? {
            if let Some(key) = deriver.derive_key(&path, &term) {
                local.entry(key).or_insert(path);
            }
        }

        let query = RangeQuery::prefix(key_namespace(&term)).with_docs(false);
        let on_store: Vec<String> = self
            .ctx
            .store
            .all_docs_raw(&query)
            .await?
            .into_iter()
            .filter(|entry| !entry.deleted)
            .map(|entry| entry.path)
            .collect();

        let mut report = ScanReport::default();
        for (key, path) in &local {
            match self
                .artifacts
                .store_customization_files(path, Some(&term))
                .await
            {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    report.failed += 1;
                    warn!(key = %key, error = %e, "Could not store customization");
                }
            }
        }

        for key in on_store.iter().filter(|key| !local.contains_key(*key)) {
            match self.artifacts.delete_config_on_database(key).await {
                Ok(true) => report.deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(key = %key, error = %e, "Could not delete customization");
                }
            }
        }

        info!(
            stored = report.stored,
            unchanged = report.unchanged,
            deleted = report.deleted,
            failed = report.failed,
            "Customization scan finished"
        );
        self.indexer.request_rebuild(false);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_trash() {
        assert!(is_trash(".trash/app.json"));
        assert!(is_trash(".obsidian/.trash/x"));
        assert!(!is_trash(".obsidian/plugins/trash-panel/main.js"));
    }

    #[test]
    fn test_report_record() {
        let mut report = ScanReport::default();
        report.record(StoreOutcome::Stored);
        report.record(StoreOutcome::Stored);
        report.record(StoreOutcome::Unchanged);
        report.record(StoreOutcome::Deleted);
        assert_eq!(
            report,
            ScanReport {
                stored: 2,
                unchanged: 1,
                deleted: 1,
                failed: 0
            }
        );
    }
}
