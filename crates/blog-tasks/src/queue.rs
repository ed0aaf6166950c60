//! The job queue contract.
//!
//! A queue accepts typed job requests, hands back a [`JobTicket`] carrying
//! the job id and a completion signal, and exposes live jobs through
//! [`JobHandle`]s whose metadata holds the job's progress.

use std::sync::Arc;

use tokio::sync::oneshot;

use blog_types::{EntityId, JobMeta, TaskKind};

use crate::error::TaskError;
use crate::registry::JobRegistry;

/// Typed arguments, one variant per task kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobArgs {
    ExportPosts { user_id: EntityId },
}

impl JobArgs {
    /// Arguments for launching `kind` on behalf of a user
    pub fn for_kind(kind: TaskKind, user_id: EntityId) -> Self {
        match kind {
            TaskKind::ExportPosts => JobArgs::ExportPosts { user_id },
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            JobArgs::ExportPosts { .. } => TaskKind::ExportPosts,
        }
    }
}

/// What a worker sees of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    pub job_id: String,
    pub args: JobArgs,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Finished,
    Failed(String),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Finished)
    }
}

/// Returned by [`JobQueue::enqueue`].
#[derive(Debug)]
pub struct JobTicket {
    pub job_id: String,
    completion: oneshot::Receiver<JobOutcome>,
}

impl JobTicket {
    pub(crate) fn new(job_id: String, completion: oneshot::Receiver<JobOutcome>) -> Self {
        Self { job_id, completion }
    }

    /// Wait for the job to end.
    ///
    /// A queue shut down before running the job reports `QueueClosed`.
    pub async fn wait(self) -> Result<JobOutcome, TaskError> {
        self.completion.await.map_err(|_| TaskError::QueueClosed)
    }
}

/// Access to a live job's metadata.
#[derive(Clone)]
pub struct JobHandle {
    job_id: String,
    registry: Arc<JobRegistry>,
}

impl JobHandle {
    pub(crate) fn new(job_id: impl Into<String>, registry: Arc<JobRegistry>) -> Self {
        Self {
            job_id: job_id.into(),
            registry,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Overwrite the job's metadata.
    pub fn set_meta(&self, meta: JobMeta) -> Result<(), TaskError> {
        self.registry.set_meta(&self.job_id, meta)
    }

    /// Overwrite the metadata unless the job is already complete.
    ///
    /// Returns `false` when nothing was written.
    pub fn advance_meta(&self, meta: JobMeta) -> Result<bool, TaskError> {
        self.registry.advance_meta(&self.job_id, meta)
    }

    /// Current metadata, `None` once the job has been evicted.
    pub fn get_meta(&self) -> Option<JobMeta> {
        self.registry.get_meta(&self.job_id)
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_id", &self.job_id)
            .finish()
    }
}

/// The queue collaborator.
pub trait JobQueue: Send + Sync {
    /// Queue a job. A fresh id is issued when `job_id` is `None`.
    fn enqueue(&self, job_id: Option<String>, args: JobArgs) -> Result<JobTicket, TaskError>;

    /// Handle to a job the queue still knows about.
    fn fetch_job(&self, job_id: &str) -> Option<JobHandle>;
}

/// Executes job bodies. Runs on a blocking thread.
pub trait JobRunner: Send + Sync {
    fn run(&self, job: &JobContext) -> Result<(), TaskError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_for_kind() {
        let args = JobArgs::for_kind(TaskKind::ExportPosts, 7);
        assert_eq!(args, JobArgs::ExportPosts { user_id: 7 });
        assert_eq!(args.kind(), TaskKind::ExportPosts);
    }

    #[test]
    fn test_handle_reads_registry() {
        let registry = Arc::new(JobRegistry::new());
        registry.register("job-1", TaskKind::ExportPosts);
        let handle = JobHandle::new("job-1", registry.clone());

        handle.set_meta(JobMeta::new(30)).unwrap();
        assert_eq!(handle.get_meta().unwrap().progress, 30);

        registry.remove("job-1");
        assert!(handle.get_meta().is_none());
        assert!(matches!(
            handle.set_meta(JobMeta::new(40)),
            Err(TaskError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ticket_reports_closed_queue() {
        let (tx, rx) = oneshot::channel();
        let ticket = JobTicket::new("job-1".to_string(), rx);
        drop(tx);
        assert!(matches!(ticket.wait().await, Err(TaskError::QueueClosed)));
    }
}
