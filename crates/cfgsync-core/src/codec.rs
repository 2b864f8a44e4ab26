//! Document body codec
//!
//! Bundles are written in a compact tokenized layout:
//!
//! ```text
//! :category SEP name SEP term
//! version
//! mtime
//! filename SEP displayName SEP version      (per file)
//! mtime SEP size
//! chunk SEP chunk SEP ...
//! ```
//!
//! `SEP` is U+200B and records end with `\n`. Headers, per-file metadata and
//! payload chunks each land on their own lines, which keeps lines of similar
//! entropy together when the store splits bodies on newlines.
//!
//! Older documents are plain JSON (or YAML). Reading never fails outright:
//! [`deserialize`] degrades to the caller's default.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::trace;

use crate::bundle::{ArtifactBundle, ArtifactFile};
use crate::category::Category;
use crate::error::CodecError;

/// Leading byte of the tokenized format
pub const SENTINEL: char = ':';
/// Field separator
pub const FIELD_SEP: char = '\u{200b}';
/// Record separator
pub const RECORD_SEP: char = '\n';

/// Maximum length of one encoded payload chunk
pub const CHUNK_LEN: usize = 64 * 1024;

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Serialize a bundle into the tokenized format
pub fn serialize(bundle: &ArtifactBundle) -> String {
    let mut out = String::new();
    out.push(SENTINEL);
    out.push_str(bundle.category.as_str());
    out.push(FIELD_SEP);
    out.push_str(&bundle.name);
    out.push(FIELD_SEP);
    out.push_str(&bundle.term);
    out.push(RECORD_SEP);
    out.push_str(bundle.version.as_deref().unwrap_or_default());
    out.push(RECORD_SEP);
    out.push_str(&bundle.mtime.to_string());
    out.push(RECORD_SEP);

    for file in &bundle.files {
        out.push_str(&file.filename);
        out.push(FIELD_SEP);
        out.push_str(file.display_name.as_deref().unwrap_or_default());
        out.push(FIELD_SEP);
        out.push_str(file.version.as_deref().unwrap_or_default());
        out.push(RECORD_SEP);
        out.push_str(&file.mtime.to_string());
        out.push(FIELD_SEP);
        out.push_str(&file.size.to_string());
        out.push(RECORD_SEP);
        for chunk in file.chunks() {
            out.push_str(chunk);
            out.push(FIELD_SEP);
        }
        out.push(RECORD_SEP);
    }
    out
}

/// Cursor over a tokenized body
struct Tokenizer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: SENTINEL.len_utf8(),
        }
    }

    /// Read up to the nearer of the next field or record separator.
    ///
    /// A field separator is consumed, a record separator is not, so reading
    /// past the last field of a line keeps yielding the empty string.
    fn next(&mut self) -> &'a str {
        let rest = &self.source[self.pos..];
        let record = rest.find(RECORD_SEP).unwrap_or(rest.len());
        let field = rest.find(FIELD_SEP).unwrap_or(rest.len());
        let token = &rest[..record.min(field)];
        self.pos += if field < record {
            field + FIELD_SEP.len_utf8()
        } else {
            record
        };
        token
    }

    /// Skip to the start of the next record
    fn next_line(&mut self) {
        let rest = &self.source[self.pos..];
        self.pos += match rest.find(RECORD_SEP) {
            Some(idx) => idx + RECORD_SEP.len_utf8(),
            None => rest.len(),
        };
    }
}

fn parse_f64(field: &'static str, value: &str) -> Result<f64, CodecError> {
    value.parse::<f64>().map_err(|_| CodecError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, CodecError> {
    value.parse::<u64>().map_err(|_| CodecError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_tokenized(source: &str) -> Result<ArtifactBundle, CodecError> {
    let mut tokens = Tokenizer::new(source);

    let category: Category = tokens.next().parse()?;
    let name = tokens.next().to_string();
    let term = tokens.next().to_string();
    tokens.next_line();
    let version = non_empty(tokens.next());
    tokens.next_line();
    let mtime = parse_f64("mtime", tokens.next())?;
    tokens.next_line();

    let mut files = Vec::new();
    loop {
        let filename = tokens.next();
        if filename.is_empty() {
            break;
        }
        let display_name = non_empty(tokens.next());
        let file_version = non_empty(tokens.next());
        tokens.next_line();
        let file_mtime = parse_f64("file.mtime", tokens.next())?;
        let size = parse_u64("file.size", tokens.next())?;
        tokens.next_line();

        let mut data = Vec::new();
        loop {
            let piece = tokens.next();
            if piece.is_empty() {
                break;
            }
            data.push(piece.to_string());
        }
        tokens.next_line();

        files.push(ArtifactFile {
            filename: filename.to_string(),
            data: Some(data),
            mtime: file_mtime,
            size,
            version: file_version,
            display_name,
        });
    }

    // The body has no bundle-level display name; it is the last one a file carries
    let display_name = files.iter().rev().find_map(|f| f.display_name.clone());

    Ok(ArtifactBundle {
        document_path: None,
        category,
        name,
        display_name,
        term,
        files,
        version,
        mtime,
    })
}

/// Decode a document body, reporting why it could not be read
pub fn try_deserialize(source: &str) -> Result<ArtifactBundle, CodecError> {
    if source.is_empty() {
        return Err(CodecError::Empty);
    }
    if source.starts_with(SENTINEL) {
        return parse_tokenized(source);
    }
    match serde_json::from_str::<ArtifactBundle>(source) {
        Ok(bundle) => Ok(bundle),
        Err(json_err) => serde_yaml::from_str::<ArtifactBundle>(source).map_err(|yaml_err| {
            CodecError::Structured(format!("json: {json_err}; yaml: {yaml_err}"))
        }),
    }
}

/// Decode a document body, falling back to `default` on unreadable content
pub fn deserialize(source: &str, default: ArtifactBundle) -> ArtifactBundle {
    match try_deserialize(source) {
        Ok(bundle) => bundle,
        Err(e) => {
            trace!(error = %e, "Unreadable document body, using default");
            default
        }
    }
}

/// Encode raw bytes into payload chunks
pub fn encode_chunks(bytes: &[u8]) -> Vec<String> {
    let encoded = STANDARD.encode(bytes);
    // Base64 output is ASCII, so byte offsets are char boundaries
    encoded
        .as_bytes()
        .chunks(CHUNK_LEN)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Decode payload chunks back into raw bytes
pub fn decode_chunks(chunks: &[String]) -> Result<Vec<u8>, CodecError> {
    STANDARD
        .decode(chunks.concat())
        .map_err(|e| CodecError::InvalidChunk(e.to_string()))
}

/// Cheap content fingerprint of a file's payload
pub fn fingerprint(chunks: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for chunk in chunks {
        hasher.update(chunk.as_bytes());
    }
    hex::encode(&hasher.finalize().as_bytes()[..8])
}
