//! Error types for the tasks crate.

use blog_storage::StorageError;
use blog_types::TaskKind;
use thiserror::Error;

/// Errors that can occur while queueing or running background jobs.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Job not known to the queue (never enqueued, or evicted)
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The queue no longer accepts jobs
    #[error("Job queue is closed")]
    QueueClosed,

    /// Workers were already started
    #[error("Worker pool is already running")]
    AlreadyRunning,

    /// The user already has an unfinished task of this kind
    #[error("{0} task is already in progress")]
    AlreadyInProgress(TaskKind),

    /// Entity referenced by a job is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        TaskError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TaskError::JobNotFound("job-123".to_string());
        assert!(err.to_string().contains("Job not found"));

        let err = TaskError::AlreadyInProgress(TaskKind::ExportPosts);
        assert_eq!(err.to_string(), "export_posts task is already in progress");
    }
}
