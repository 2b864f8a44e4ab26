//! Artifact data model
//!
//! An [`ArtifactBundle`] is one logical synchronization unit: a settings file,
//! a theme, a snippet, or an extension, together with all of its physical
//! files. Bundles are built transiently on every store, apply and compare;
//! the listing index only keeps the lighter [`ArtifactSummary`] projection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::category::{Category, LogicalKey, settings_key};
use crate::codec::fingerprint;

/// One physical file of an artifact
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactFile {
    /// Path relative to the configuration root
    pub filename: String,
    /// Base64 payload chunks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<String>>,
    /// Modification time in milliseconds since the epoch
    pub mtime: f64,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ArtifactFile {
    /// Payload chunks, empty when the file carries none
    pub fn chunks(&self) -> &[String] {
        self.data.as_deref().unwrap_or_default()
    }
}

/// One logical synchronization unit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_path: Option<LogicalKey>,
    pub category: Category,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub term: String,
    #[serde(default)]
    pub files: Vec<ArtifactFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Running average of the files' modification times
    #[serde(default)]
    pub mtime: f64,
}

impl ArtifactBundle {
    /// Create an empty bundle
    pub fn new(category: Category, name: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
            term: term.into(),
            ..Default::default()
        }
    }

    /// Append a file, folding its metadata into the bundle.
    ///
    /// The bundle mtime is the running average of the file mtimes, not the
    /// maximum; the store's unchanged-check compares against this exact value.
    pub fn push_file(&mut self, file: ArtifactFile) {
        if file.version.is_some() {
            self.version = file.version.clone();
        }
        if file.display_name.is_some() {
            self.display_name = file.display_name.clone();
        }
        self.mtime = if self.mtime == 0.0 {
            file.mtime
        } else {
            (file.mtime + self.mtime) / 2.0
        };
        self.files.push(file);
    }

    /// The representative file used for merging
    pub fn primary_file(&self) -> Option<&ArtifactFile> {
        self.files.first()
    }

    /// Human-facing label: display name when known, otherwise the name
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }

    /// Key of this artifact in the settings table
    pub fn settings_key(&self) -> String {
        settings_key(self.category, &self.name)
    }
}

/// Display projection of a file: payload replaced by a fingerprint
#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    pub filename: String,
    pub fingerprint: String,
    pub mtime: f64,
    pub size: u64,
    pub version: Option<String>,
    pub display_name: Option<String>,
}

/// Display projection of an artifact kept in the listing index
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSummary {
    pub document_path: LogicalKey,
    pub category: Category,
    pub name: String,
    pub term: String,
    pub display_name: Option<String>,
    pub version: Option<String>,
    pub mtime: f64,
    pub files: Vec<FileSummary>,
}

impl ArtifactSummary {
    /// Project a loaded bundle stored under `document_path`
    pub fn from_bundle(bundle: &ArtifactBundle, document_path: impl Into<LogicalKey>) -> Self {
        let files = bundle
            .files
            .iter()
            .map(|file| FileSummary {
                filename: file.filename.clone(),
                fingerprint: fingerprint(file.chunks()),
                mtime: file.mtime,
                size: file.size,
                version: file.version.clone(),
                display_name: file.display_name.clone(),
            })
            .collect();

        Self {
            document_path: document_path.into(),
            category: bundle.category,
            name: bundle.name.clone(),
            term: bundle.term.clone(),
            display_name: bundle.display_name.clone(),
            version: bundle.version.clone(),
            mtime: bundle.mtime,
            files,
        }
    }

    /// Key of this artifact in the settings table
    pub fn settings_key(&self) -> String {
        settings_key(self.category, &self.name)
    }

    /// Human-facing label
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }
}

/// Optional fields read from a manifest-like file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse the optional `name`/`version` fields of a manifest.
///
/// Callers treat an error as "no metadata", never as a failure of the file.
pub fn parse_manifest(bytes: &[u8]) -> Result<ManifestInfo, serde_json::Error> {
    let value: Value = serde_json::from_slice(bytes)?;
    Ok(ManifestInfo {
        name: value.get("name").map(value_to_string),
        version: value.get("version").map(value_to_string),
    })
}
