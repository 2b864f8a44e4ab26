//! In-memory storage adapter with a controllable clock

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use cfgsync_core::{DirListing, FileKind, FileStat, StorageAdapter, StorageError};
use dashmap::{DashMap, DashSet};

/// Each write advances the clock by this many milliseconds
const CLOCK_STEP_MS: u64 = 1000;

#[derive(Debug, Clone)]
struct MemFile {
    data: Vec<u8>,
    mtime: f64,
    ctime: f64,
}

/// In-memory storage adapter
///
/// Every write stamps the file with the current clock and then advances the
/// clock, so consecutive writes get strictly increasing modification times.
#[derive(Debug)]
pub struct MemoryStorage {
    files: DashMap<String, MemFile>,
    folders: DashSet<String>,
    clock: AtomicU64,
    writes: AtomicUsize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn parent_of(path: &str) -> &str {
    path.rfind('/').map(|idx| &path[..idx]).unwrap_or("")
}

impl MemoryStorage {
    /// Create an empty storage whose clock starts at the current time
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        Self::with_clock(now)
    }

    /// Create an empty storage with an explicit clock origin (milliseconds)
    pub fn with_clock(start_ms: u64) -> Self {
        Self {
            files: DashMap::new(),
            folders: DashSet::new(),
            clock: AtomicU64::new(start_ms),
            writes: AtomicUsize::new(0),
        }
    }

    fn tick(&self) -> f64 {
        self.clock.fetch_add(CLOCK_STEP_MS, Ordering::SeqCst) as f64
    }

    fn register_parents(&self, path: &str) {
        let mut parent = parent_of(path);
        while !parent.is_empty() {
            self.folders.insert(parent.to_string());
            parent = parent_of(parent);
        }
    }

    /// Insert a file, stamping it with the clock
    pub fn insert(&self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        let path = path.into();
        let mtime = self.tick();
        self.register_parents(&path);
        let ctime = self.files.get(&path).map(|f| f.ctime).unwrap_or(mtime);
        self.files.insert(
            path,
            MemFile {
                data: data.into(),
                mtime,
                ctime,
            },
        );
    }

    /// Remove a file; returns whether it existed
    pub fn remove(&self, path: &str) -> bool {
        self.files.remove(path).is_some()
    }

    /// Override the modification time of a file
    pub fn set_mtime(&self, path: &str, mtime: f64) -> bool {
        match self.files.get_mut(path) {
            Some(mut file) => {
                file.mtime = mtime;
                true
            }
            None => false,
        }
    }

    /// Current content of a file
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.files.get(path).map(|f| f.data.clone())
    }

    /// Content of a file as UTF-8 text
    pub fn text(&self, path: &str) -> Option<String> {
        self.contents(path)
            .map(|data| String::from_utf8_lossy(&data).into_owned())
    }

    /// Number of writes made through the adapter interface
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Every file path, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.files.iter().map(|f| f.key().clone()).collect();
        paths.sort();
        paths
    }

    fn is_folder(&self, path: &str) -> bool {
        self.folders.contains(path)
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn stat(&self, path: &str) -> Result<Option<FileStat>, StorageError> {
        if let Some(file) = self.files.get(path) {
            return Ok(Some(FileStat {
                mtime: file.mtime,
                ctime: file.ctime,
                size: file.data.len() as u64,
                kind: FileKind::File,
            }));
        }
        if self.is_folder(path) {
            return Ok(Some(FileStat {
                mtime: 0.0,
                ctime: 0.0,
                size: 0,
                kind: FileKind::Folder,
            }));
        }
        Ok(None)
    }

    async fn read_binary(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.contents(path)
            .ok_or_else(|| StorageError::not_found(path))
    }

    async fn write_binary(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.is_folder(path) {
            return Err(StorageError::io(path, "is a folder"));
        }
        self.insert(path, data.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write_text(&self, path: &str, text: &str) -> Result<(), StorageError> {
        self.write_binary(path, text.as_bytes()).await
    }

    async fn list(&self, dir: &str) -> Result<DirListing, StorageError> {
        let dir = dir.trim_end_matches('/');
        if !self.is_folder(dir) {
            return Err(StorageError::not_found(dir));
        }
        let files: BTreeSet<String> = self
            .files
            .iter()
            .filter(|f| parent_of(f.key()) == dir)
            .map(|f| f.key().clone())
            .collect();
        let folders: BTreeSet<String> = self
            .folders
            .iter()
            .filter(|f| parent_of(f.key()) == dir)
            .map(|f| f.key().clone())
            .collect();
        Ok(DirListing {
            files: files.into_iter().collect(),
            folders: folders.into_iter().collect(),
        })
    }

    async fn ensure_dir(&self, dir: &str) -> Result<(), StorageError> {
        let dir = dir.trim_end_matches('/');
        if self.files.contains_key(dir) {
            return Err(StorageError::io(dir, "is a file"));
        }
        self.register_parents(dir);
        self.folders.insert(dir.to_string());
        Ok(())
    }
}
