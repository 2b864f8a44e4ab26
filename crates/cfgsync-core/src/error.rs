//! Error types for cfgsync

use thiserror::Error;

/// Errors raised while decoding a document body
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Empty document body")]
    Empty,

    #[error("Invalid number in field `{field}`: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Unknown category: {0:?}")]
    UnknownCategory(String),

    #[error("Structured parse failed: {0}")]
    Structured(String),

    #[error("Invalid payload chunk: {0}")]
    InvalidChunk(String),
}

/// Errors reported by the replicated document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Store write failed: {0}")]
    WriteFailed(String),

    #[error("Store I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Create a new NotFound error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Create a new WriteFailed error
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed(message.into())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Errors reported by the host file-system adapter
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an I/O error bound to a path
    pub fn io(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Errors reported by the host application
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Extension not found: {0}")]
    ExtensionNotFound(String),

    #[error("Host command failed: {0}")]
    CommandFailed(String),
}

/// Errors raised while persisting settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings I/O error: {0}")]
    Io(String),

    #[error("Settings format error: {0}")]
    Format(String),
}

impl From<std::io::Error> for SettingsError {
    fn from(err: std::io::Error) -> Self {
        SettingsError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        SettingsError::Format(err.to_string())
    }
}
