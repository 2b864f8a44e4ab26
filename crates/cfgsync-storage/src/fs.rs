//! Local file-system storage adapter

use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use cfgsync_core::{DirListing, FileKind, FileStat, StorageAdapter, StorageError};
use tracing::trace;

/// Storage adapter over a vault directory on disk
///
/// Paths handed to the adapter are vault-relative and `/`-separated.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

fn millis(time: std::io::Result<SystemTime>) -> Option<f64> {
    let since = time.ok()?.duration_since(UNIX_EPOCH).ok()?;
    Some(since.as_millis() as f64)
}

impl LocalStorage {
    /// Create an adapter rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The vault directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a vault-relative path, refusing anything that escapes the root
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(&self, full: &Path, path: &str) -> Result<(), StorageError> {
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(path, e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    async fn stat(&self, path: &str) -> Result<Option<FileStat>, StorageError> {
        let full = self.resolve(path)?;
        let meta = match tokio::fs::metadata(&full).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(path, e)),
        };
        let mtime = millis(meta.modified()).unwrap_or_default();
        Ok(Some(FileStat {
            mtime,
            ctime: millis(meta.created()).unwrap_or(mtime),
            size: meta.len(),
            kind: if meta.is_dir() {
                FileKind::Folder
            } else {
                FileKind::File
            },
        }))
    }

    async fn read_binary(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::not_found(path)
            } else {
                StorageError::io(path, e)
            }
        })
    }

    async fn write_binary(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        self.ensure_parent(&full, path).await?;
        trace!(path, bytes = data.len(), "Writing file");
        tokio::fs::write(&full, data)
            .await
            .map_err(|e| StorageError::io(path, e))
    }

    async fn write_text(&self, path: &str, text: &str) -> Result<(), StorageError> {
        self.write_binary(path, text.as_bytes()).await
    }

    async fn list(&self, dir: &str) -> Result<DirListing, StorageError> {
        let full = self.resolve(dir)?;
        let mut entries = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| StorageError::io(dir, e))?;
        let prefix = dir.trim_end_matches('/');
        let mut listing = DirListing::default();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let child = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StorageError::io(&child, e))?;
            if file_type.is_dir() {
                listing.folders.push(child);
            } else {
                listing.files.push(child);
            }
        }

        listing.files.sort();
        listing.folders.sort();
        Ok(listing)
    }

    async fn ensure_dir(&self, dir: &str) -> Result<(), StorageError> {
        let full = self.resolve(dir)?;
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(|e| StorageError::io(dir, e))
    }
}
