//! Error types for the reconciliation engine

use cfgsync_core::{CodecError, HostError, SettingsError, StorageError, StoreError};
use thiserror::Error;

/// Errors that can occur in the reconciliation engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The device/vault name has not been configured yet
    #[error("The device name has to be configured before customizations can be synchronized")]
    TermNotConfigured,

    /// An artifact was handed over without the key it is stored under
    #[error("Internal error: document path does not exist")]
    MissingDocumentPath,

    /// The document for a key is absent or soft-deleted
    #[error("Not found on database: {0}")]
    DocumentNotFound(String),

    /// A stored artifact carries no files
    #[error("Artifact has no files: {0}")]
    EmptyArtifact(String),

    /// The path is not a sync target
    #[error("Not a customization file: {0}")]
    Untracked(String),

    /// The engine was built without a required collaborator
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// Replicated document store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Host file-system error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Host application error
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    /// Settings persistence error
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Corrupt document body or payload
    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),
}

impl EngineError {
    /// Create a new DocumentNotFound error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::DocumentNotFound(key.into())
    }

    /// Whether the failure means the device must be configured first
    pub fn is_configuration_required(&self) -> bool {
        matches!(self, Self::TermNotConfigured)
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
