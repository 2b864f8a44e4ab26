//! # cfgsync storage
//!
//! Implementations of the document store, storage adapter and settings
//! collaborators consumed by the sync engine.
//!
//! ## Features
//!
//! - **InMemoryDocumentStore**: key-ordered in-memory store for tests
//! - **JsonFileDocumentStore**: append-only JSON-lines log replayed on open
//! - **LocalStorage**: vault directory on disk through `tokio::fs`
//! - **MemoryStorage**: in-memory vault with a controllable clock
//! - **JsonSettingsFile**: settings persisted as JSON
//!
//! ## Example
//!
//! ```rust,ignore
//! use cfgsync_core::{DocumentEntry, DocumentStore, RangeQuery};
//! use cfgsync_storage::InMemoryDocumentStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryDocumentStore::new();
//!     store.put(DocumentEntry::new("ix:desk/CONFIG/app.json.md", ":...", 1.0)).await.unwrap();
//!
//!     let entries = store.find_entries(&RangeQuery::prefix("ix:desk/")).await.unwrap();
//!     assert_eq!(entries.len(), 1);
//! }
//! ```

pub mod fs;
pub mod memory;
pub mod memory_fs;
pub mod persistent;
pub mod settings_file;

pub use fs::LocalStorage;
pub use memory::InMemoryDocumentStore;
pub use memory_fs::MemoryStorage;
pub use persistent::JsonFileDocumentStore;
pub use settings_file::JsonSettingsFile;
