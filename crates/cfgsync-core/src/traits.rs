//! Collaborator traits
//!
//! The engine talks to the outside world only through these traits:
//!
//! - [`DocumentStore`]: the replicated append-only document store
//! - [`StorageAdapter`]: the host file system, addressed by vault-relative paths
//! - [`HostApp`]: extension reload, host commands, prompts and notices
//! - [`Adjudicator`]: the human step of a merge
//! - [`SettingsStore`]: settings persistence

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::category::RANGE_END;
use crate::error::{HostError, SettingsError, StorageError, StoreError};
use crate::settings::SyncSettings;

/// A document in the replicated store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    /// Key of the document
    pub path: String,
    /// Document body; empty when fetched without documents
    #[serde(default)]
    pub data: String,
    pub mtime: f64,
    pub ctime: f64,
    pub size: u64,
    #[serde(default)]
    pub deleted: bool,
    /// Conflicting revisions, filled only when requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<String>,
}

impl DocumentEntry {
    /// A live document whose size is the body length
    pub fn new(path: impl Into<String>, data: impl Into<String>, mtime: f64) -> Self {
        let data = data.into();
        Self {
            path: path.into(),
            size: data.len() as u64,
            data,
            mtime,
            ctime: mtime,
            deleted: false,
            conflicts: Vec::new(),
        }
    }

    /// Metadata view of this document
    pub fn meta(&self) -> DocumentMeta {
        DocumentMeta {
            path: self.path.clone(),
            mtime: self.mtime,
            ctime: self.ctime,
            size: self.size,
            deleted: self.deleted,
        }
    }
}

/// Document metadata without the body
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMeta {
    pub path: String,
    pub mtime: f64,
    pub ctime: f64,
    pub size: u64,
    pub deleted: bool,
}

/// Key range query: `start` inclusive, `end` exclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub start: String,
    pub end: String,
    pub include_docs: bool,
    pub limit: Option<usize>,
}

impl RangeQuery {
    /// Every key starting with `prefix`, bodies included
    pub fn prefix(prefix: impl Into<String>) -> Self {
        let start = prefix.into();
        let mut end = start.clone();
        end.push(RANGE_END);
        Self {
            start,
            end,
            include_docs: true,
            limit: None,
        }
    }

    /// The first key at or after `key` within its own prefix range
    pub fn key(key: impl Into<String>) -> Self {
        Self::prefix(key).with_limit(1)
    }

    /// Whether bodies are returned
    pub fn with_docs(mut self, include_docs: bool) -> Self {
        self.include_docs = include_docs;
        self
    }

    /// Cap the number of results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a key falls inside the range
    pub fn contains(&self, key: &str) -> bool {
        key >= self.start.as_str() && key < self.end.as_str()
    }
}

/// The replicated document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a live document; soft-deleted and absent documents are `None`
    async fn get(&self, path: &str, with_conflicts: bool)
    -> Result<Option<DocumentEntry>, StoreError>;

    /// Fetch document metadata, soft-deleted documents included
    async fn get_meta(&self, path: &str) -> Result<Option<DocumentMeta>, StoreError>;

    /// Create or replace a document
    async fn put(&self, entry: DocumentEntry) -> Result<(), StoreError>;

    /// Live documents in a key range, in key order
    async fn find_entries(&self, query: &RangeQuery) -> Result<Vec<DocumentEntry>, StoreError>;

    /// Raw documents in a key range, soft-deleted ones included
    async fn all_docs_raw(&self, query: &RangeQuery) -> Result<Vec<DocumentEntry>, StoreError>;
}

/// Kind of a file-system entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Folder,
}

/// Result of a stat call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileStat {
    /// Milliseconds since the epoch
    pub mtime: f64,
    pub ctime: f64,
    pub size: u64,
    pub kind: FileKind,
}

/// Entries directly inside a folder, as full vault-relative paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing {
    pub files: Vec<String>,
    pub folders: Vec<String>,
}

/// The host file system
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Stat a path; `None` when it does not exist
    async fn stat(&self, path: &str) -> Result<Option<FileStat>, StorageError>;

    async fn read_binary(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    async fn write_binary(&self, path: &str, data: &[u8]) -> Result<(), StorageError>;

    async fn write_text(&self, path: &str, text: &str) -> Result<(), StorageError>;

    async fn list(&self, dir: &str) -> Result<DirListing, StorageError>;

    /// Create a folder and its parents
    async fn ensure_dir(&self, dir: &str) -> Result<(), StorageError>;
}

/// An extension installed in the host application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledExtension {
    pub id: String,
    pub name: String,
    /// Install directory, vault-relative
    pub dir: String,
    pub enabled: bool,
}

/// The host application
#[async_trait]
pub trait HostApp: Send + Sync {
    async fn installed_extensions(&self) -> Vec<InstalledExtension>;

    async fn unload_extension(&self, id: &str) -> Result<(), HostError>;

    async fn load_extension(&self, id: &str) -> Result<(), HostError>;

    /// Execute a named host command (e.g. `app:reload`)
    async fn execute_command(&self, command_id: &str) -> Result<(), HostError>;

    /// Ask a yes/no question; `true` on "yes"
    async fn ask_yes_no(&self, message: &str) -> bool;

    /// Show a user-visible notice
    fn notify(&self, message: &str);
}

/// One side of a merge
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSide {
    pub document_path: String,
    pub filename: String,
    /// Decoded file content
    pub content: String,
    pub mtime: f64,
}

/// The human adjudication step of a merge
#[async_trait]
pub trait Adjudicator: Send + Sync {
    /// Return the resolved content, or `None` when no decision was made
    async fn resolve(&self, display_path: &str, left: &MergeSide, right: &MergeSide)
    -> Option<String>;
}

/// Settings persistence
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn save(&self, settings: &SyncSettings) -> Result<(), SettingsError>;
}
