//! Error types for the export crate.

use std::path::PathBuf;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors that can occur while building or persisting export artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// I/O error while reading or writing an artifact.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid file format during load.
    #[error("Invalid file format: {message}")]
    InvalidFormat { message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// Payload checksum does not match the one recorded in the file.
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    /// Value-set URL cannot be turned into a file name.
    #[error("Invalid value set URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// CSV read or write failure.
    #[cfg(feature = "csv")]
    #[error("CSV error at {path}: {message}")]
    Csv { path: PathBuf, message: String },

    /// Membership filter configuration out of range.
    #[error("Invalid membership filter config: {0}")]
    InvalidConfig(String),
}

impl ExportError {
    /// Creates an I/O error with path context.
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a CSV error with path context.
    #[cfg(feature = "csv")]
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            message: source.to_string(),
        }
    }
}
