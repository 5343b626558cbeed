//! Error types for document loading, reference resolution, and schema access.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading documents, resolving references, and
/// querying schema nodes.
#[derive(Debug, Error)]
pub enum SchemaError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed schema document: {message}")]
    MalformedDocument { message: String },

    // Resolution errors (exit code 2)
    #[error("cannot resolve reference \"{reference}\": {message}")]
    UnresolvedReference { reference: String, message: String },

    #[error("schema has no base location, cannot resolve relative reference \"{reference}\"")]
    NoBaseLocation { reference: String },

    // Accessor errors (exit code 2)
    #[error("missing field \"{key}\"")]
    MissingField { key: String },

    #[error("field \"{key}\": expected {expected}, got {actual}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    // Merge errors (exit code 2)
    #[error("conflicting values for keyword \"{keyword}\" cannot be merged")]
    MergeConflict { keyword: String },

    #[error("schema store has been dropped")]
    StoreDropped,
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. } | Self::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            Self::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}
