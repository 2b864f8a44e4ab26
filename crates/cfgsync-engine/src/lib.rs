//! # cfgsync engine
//!
//! Keeps customization files of a vault (settings, themes, snippets and
//! extensions) consistent with a replicated document store.
//!
//! ## Components
//!
//! - [`ArtifactStore`]: reads artifacts from storage, stores, applies and deletes them
//! - [`ReconciliationScanner`]: full pass storing local artifacts and deleting orphans
//! - [`ChangeWatcher`]: filters and debounces raw file events
//! - [`ListIndexer`]: observable list of known artifacts, rebuilt with bounded concurrency
//! - [`MergeResolver`]: human-adjudicated merge of two replicas
//! - [`PeriodicSweep`]: interval-driven reconciliation
//! - [`ConfigSync`]: facade owning all of the above
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cfgsync_core::SyncSettings;
//! use cfgsync_engine::ConfigSync;
//!
//! let sync = ConfigSync::builder()
//!     .settings(SyncSettings::for_term("laptop"))
//!     .document_store(Arc::new(store))
//!     .storage(Arc::new(storage))
//!     .host(Arc::new(host))
//!     .adjudicator(Arc::new(adjudicator))
//!     .settings_store(Arc::new(settings_file))
//!     .build()?;
//!
//! sync.scan_all_config_files(true).await;
//! for artifact in sync.artifact_list().iter() {
//!     println!("{} {}", artifact.document_path, artifact.label());
//! }
//! ```

pub mod artifact_store;
pub mod config;
mod context;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod merge;
pub mod scanner;
pub mod schedule;
pub mod sweep;
pub mod watcher;

pub use artifact_store::{ArtifactStore, StoreOutcome};
pub use config::{EngineConfig, RESTART_COMMAND};
pub use engine::{ConfigSync, ConfigSyncBuilder};
pub use error::{EngineError, EngineResult};
pub use indexer::ListIndexer;
pub use merge::MergeResolver;
pub use scanner::{ReconciliationScanner, ScanReport};
pub use schedule::{ScopeGuard, SerializedScopes, TaskScheduler};
pub use sweep::PeriodicSweep;
pub use watcher::{ChangeWatcher, WatchOutcome};
