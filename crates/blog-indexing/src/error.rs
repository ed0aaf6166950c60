//! Error types for index synchronization and search.

use blog_search::SearchError;
use blog_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while synchronizing or querying the text index
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Text index operation failed
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// The operation needs a text index and none is configured
    #[error("Text index is not configured")]
    Disabled,
}
