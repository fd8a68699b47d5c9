//! Error types for mamirc-storage
//!
//! This module defines the error types used throughout the storage crate.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database file does not exist
    #[error("File does not exist: {0}")]
    NotFound(String),

    /// I/O error while accessing the database file
    #[error("I/O error: {0}")]
    Io(String),

    /// A read could not acquire the database within the busy timeout
    #[error("Database busy: {0}")]
    Busy(String),

    /// The storage engine reports low-level structural damage
    #[error("Structural corruption: {0}")]
    Corrupt(String),

    /// Any other database error
    #[error("Database error: {0}")]
    Database(String),

    /// The key is reserved or otherwise not allowed
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),
}

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound(item.into())
    }

    /// Create a new Corrupt error
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }

    /// Create a new Busy error
    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy(message.into())
    }

    /// Whether this error belongs to the structural-corruption class
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Corrupt(_))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        let message = err.to_string();
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::Busy(message),
            Some(ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) => Self::Corrupt(message),
            Some(ErrorCode::CannotOpen | ErrorCode::SystemIoFailure) => Self::Io(message),
            _ => Self::Database(message),
        }
    }
}
