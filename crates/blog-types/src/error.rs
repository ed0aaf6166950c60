//! Error types for the blog domain.

use thiserror::Error;

/// Unified error type for domain-level operations.
#[derive(Debug, Error)]
pub enum BlogError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unknown table name in a stored record
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
