//! # cfgsync core
//!
//! Core types, key derivation, document codec and collaborator traits for
//! synchronizing customization artifacts (settings, themes, snippets and
//! extensions) through a replicated document store.
//!
//! ## Key Types
//!
//! - [`ArtifactBundle`]: one logical artifact with all of its physical files
//! - [`ArtifactSummary`]: lightweight projection kept by the listing index
//! - [`Category`]: closed classification of a physical path
//! - [`KeyDeriver`]: maps physical paths to logical keys and sibling sets
//! - [`SyncSettings`]: user settings consumed by the engine
//!
//! ## Key Traits
//!
//! - [`DocumentStore`], [`StorageAdapter`], [`HostApp`], [`Adjudicator`],
//!   [`SettingsStore`]: narrow interfaces to external collaborators
//!
//! ## Example
//!
//! ```rust
//! use cfgsync_core::{codec, ArtifactBundle, ArtifactFile, Category, KeyDeriver};
//!
//! let deriver = KeyDeriver::new(".obsidian");
//! let key = deriver.derive_key(".obsidian/appearance.json", "laptop").unwrap();
//! assert_eq!(key, "ix:laptop/CONFIG/appearance.json.md");
//!
//! let mut bundle = ArtifactBundle::new(Category::Config, "appearance.json", "laptop");
//! bundle.push_file(ArtifactFile {
//!     filename: "appearance.json".into(),
//!     data: Some(codec::encode_chunks(b"{}")),
//!     mtime: 1000.0,
//!     size: 2,
//!     ..Default::default()
//! });
//! let body = codec::serialize(&bundle);
//! assert_eq!(codec::deserialize(&body, ArtifactBundle::default()), bundle);
//! ```

pub mod bundle;
pub mod category;
pub mod codec;
pub mod error;
pub mod settings;
pub mod traits;

pub use bundle::{ArtifactBundle, ArtifactFile, ArtifactSummary, FileSummary, ManifestInfo, parse_manifest};
pub use category::{
    Category, KeyDeriver, LogicalKey, RANGE_END, SYNC_PREFIX, key_for, key_namespace,
    settings_key,
};
pub use error::{CodecError, HostError, SettingsError, StorageError, StoreError};
pub use settings::{ExtendedSyncSetting, SyncMode, SyncSettings};
pub use traits::{
    Adjudicator, DirListing, DocumentEntry, DocumentMeta, DocumentStore, FileKind, FileStat,
    HostApp, InstalledExtension, MergeSide, RangeQuery, SettingsStore, StorageAdapter,
};
