//! In-memory document store
//!
//! Reference implementation of [`DocumentStore`] used by tests and as the
//! cache behind [`JsonFileDocumentStore`](crate::JsonFileDocumentStore).

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cfgsync_core::{DocumentEntry, DocumentMeta, DocumentStore, RangeQuery, StoreError};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

/// In-memory replicated document store
///
/// Documents are kept in key order so range queries behave like the real
/// store. Soft-deleted documents stay in the map and are only visible
/// through [`DocumentStore::get_meta`] and [`DocumentStore::all_docs_raw`].
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<BTreeMap<String, DocumentEntry>>,
    /// Conflicting revisions per key, injected by tests
    conflicts: DashMap<String, Vec<String>>,
    put_count: AtomicUsize,
}

impl InMemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls since creation
    pub fn put_count(&self) -> usize {
        self.put_count.load(Ordering::SeqCst)
    }

    /// Number of documents, soft-deleted ones included
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Attach conflicting revisions to a key
    pub fn set_conflicts(&self, path: impl Into<String>, revisions: Vec<String>) {
        self.conflicts.insert(path.into(), revisions);
    }

    /// Insert a document without counting it as a write
    pub(crate) fn restore(&self, entry: DocumentEntry) {
        self.docs.write().insert(entry.path.clone(), entry);
    }

    /// Snapshot of every document in key order
    pub fn snapshot(&self) -> Vec<DocumentEntry> {
        self.docs.read().values().cloned().collect()
    }

    fn range(&self, query: &RangeQuery, include_deleted: bool) -> Vec<DocumentEntry> {
        if query.start > query.end {
            return Vec::new();
        }
        let docs = self.docs.read();
        let bounds = (
            Bound::Included(query.start.as_str()),
            Bound::Excluded(query.end.as_str()),
        );
        docs.range::<str, _>(bounds)
            .map(|(_, entry)| entry)
            .filter(|entry| include_deleted || !entry.deleted)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|entry| {
                let mut entry = entry.clone();
                if !query.include_docs {
                    entry.data.clear();
                }
                entry
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(
        &self,
        path: &str,
        with_conflicts: bool,
    ) -> Result<Option<DocumentEntry>, StoreError> {
        let Some(mut entry) = self.docs.read().get(path).filter(|e| !e.deleted).cloned() else {
            return Ok(None);
        };
        if with_conflicts && let Some(revisions) = self.conflicts.get(path) {
            entry.conflicts = revisions.clone();
        }
        Ok(Some(entry))
    }

    async fn get_meta(&self, path: &str) -> Result<Option<DocumentMeta>, StoreError> {
        Ok(self.docs.read().get(path).map(DocumentEntry::meta))
    }

    async fn put(&self, entry: DocumentEntry) -> Result<(), StoreError> {
        trace!(path = %entry.path, deleted = entry.deleted, size = entry.size, "Storing document");
        let mut entry = entry;
        entry.conflicts.clear();
        self.docs.write().insert(entry.path.clone(), entry);
        self.put_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_entries(&self, query: &RangeQuery) -> Result<Vec<DocumentEntry>, StoreError> {
        let entries = self.range(query, false);
        debug!(start = %query.start, count = entries.len(), "Range query");
        Ok(entries)
    }

    async fn all_docs_raw(&self, query: &RangeQuery) -> Result<Vec<DocumentEntry>, StoreError> {
        Ok(self.range(query, true))
    }
}
