//! Storage layer error types.

use blog_types::BlogError;
use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB operation failed
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Column family not found
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Key encoding/decoding error
    #[error("Key error: {0}")]
    Key(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Commit rejected by a uniqueness or foreign key check
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Operation not allowed in the session's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A commit listener rejected the transaction
    #[error("Listener {name} failed: {reason}")]
    Listener { name: String, reason: String },
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<BlogError> for StorageError {
    fn from(err: BlogError) -> Self {
        match err {
            BlogError::Serialization(e) => StorageError::Serialization(e.to_string()),
            BlogError::UnknownTable(table) => StorageError::ColumnFamilyNotFound(table),
            other => StorageError::InvalidState(other.to_string()),
        }
    }
}
