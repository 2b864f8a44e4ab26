//! File-backed document store
//!
//! Every `put` is appended to a JSON-lines log; the log is replayed into an
//! [`InMemoryDocumentStore`] on open, so the last record for a key wins.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cfgsync_core::{DocumentEntry, DocumentMeta, DocumentStore, RangeQuery, StoreError};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::memory::InMemoryDocumentStore;

/// Persistent document store backed by an append-only log file
#[derive(Debug)]
pub struct JsonFileDocumentStore {
    log_path: PathBuf,
    cache: InMemoryDocumentStore,
    writer: Arc<RwLock<Option<BufWriter<File>>>>,
    /// Flush after every append
    sync_writes: bool,
}

impl JsonFileDocumentStore {
    /// Open (or create) a store at the given log file
    pub async fn open(log_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_options(log_path, true).await
    }

    /// Open with explicit flush behaviour
    pub async fn with_options(
        log_path: impl AsRef<Path>,
        sync_writes: bool,
    ) -> Result<Self, StoreError> {
        let log_path = log_path.as_ref().to_path_buf();
        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let store = Self {
            log_path,
            cache: InMemoryDocumentStore::new(),
            writer: Arc::new(RwLock::new(None)),
            sync_writes,
        };
        store.load().await?;
        store.open_writer().await?;
        Ok(store)
    }

    /// Path of the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Number of documents, soft-deleted ones included
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    async fn load(&self) -> Result<(), StoreError> {
        if !tokio::fs::try_exists(&self.log_path).await? {
            debug!(path = ?self.log_path, "No existing document log, starting fresh");
            return Ok(());
        }

        let file = File::open(&self.log_path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut loaded = 0usize;
        let mut errors = 0usize;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DocumentEntry>(&line) {
                Ok(entry) => {
                    self.cache.restore(entry);
                    loaded += 1;
                }
                Err(e) => {
                    errors += 1;
                    warn!(error = %e, "Failed to parse document log entry, skipping");
                }
            }
        }

        info!(
            loaded,
            errors,
            documents = self.cache.len(),
            "Finished loading document log"
        );
        Ok(())
    }

    async fn open_writer(&self) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;
        *self.writer.write().await = Some(BufWriter::new(file));
        debug!(path = ?self.log_path, "Opened document log for writing");
        Ok(())
    }

    async fn append(
        writer: &mut Option<BufWriter<File>>,
        entry: &DocumentEntry,
        sync_writes: bool,
    ) -> Result<(), StoreError> {
        let writer = writer
            .as_mut()
            .ok_or_else(|| StoreError::write_failed("document log is not open"))?;

        let line = serde_json::to_string(entry)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        if sync_writes {
            writer.flush().await?;
        }
        Ok(())
    }

    /// Flush buffered appends
    pub async fn flush(&self) -> Result<(), StoreError> {
        if let Some(writer) = self.writer.write().await.as_mut() {
            writer.flush().await?;
        }
        Ok(())
    }

    /// Rewrite the log with one record per key
    ///
    /// Holds the writer for the whole rewrite; puts wait for it, so none can
    /// land in the log being replaced.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let temp_path = self.log_path.with_extension("tmp");
        info!(path = ?self.log_path, "Compacting document log");

        let mut guard = self.writer.write().await;
        {
            let mut writer = BufWriter::new(File::create(&temp_path).await?);
            for entry in self.cache.snapshot() {
                let line = serde_json::to_string(&entry)?;
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
            }
            writer.flush().await?;
        }

        if let Some(mut old) = guard.take() {
            old.flush().await?;
        }
        tokio::fs::rename(&temp_path, &self.log_path).await?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;
        *guard = Some(BufWriter::new(file));

        info!(documents = self.cache.len(), "Document log compaction complete");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonFileDocumentStore {
    async fn get(
        &self,
        path: &str,
        with_conflicts: bool,
    ) -> Result<Option<DocumentEntry>, StoreError> {
        self.cache.get(path, with_conflicts).await
    }

    async fn get_meta(&self, path: &str) -> Result<Option<DocumentMeta>, StoreError> {
        self.cache.get_meta(path).await
    }

    async fn put(&self, entry: DocumentEntry) -> Result<(), StoreError> {
        // The cache is updated under the writer so compaction sees every logged put
        let mut writer = self.writer.write().await;
        Self::append(&mut writer, &entry, self.sync_writes).await?;
        self.cache.put(entry).await
    }

    async fn find_entries(&self, query: &RangeQuery) -> Result<Vec<DocumentEntry>, StoreError> {
        self.cache.find_entries(query).await
    }

    async fn all_docs_raw(&self, query: &RangeQuery) -> Result<Vec<DocumentEntry>, StoreError> {
        self.cache.all_docs_raw(query).await
    }
}
