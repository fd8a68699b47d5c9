//! Error types for mamirc-checker

use std::path::PathBuf;

use mamirc_core::ConnectionId;
use mamirc_storage::StorageError;
use thiserror::Error;

/// Errors raised by the checker's tooling around a run
///
/// Integrity problems inside the archive are diagnostics, not errors.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Writing a report failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A connection cannot be summarized because its log does not start properly
    #[error("Invalid connection {connection_id}: {reason}")]
    InvalidConnection {
        connection_id: ConnectionId,
        reason: String,
    },
}

/// Result type for checker operations
pub type CheckResult<T> = Result<T, CheckError>;
