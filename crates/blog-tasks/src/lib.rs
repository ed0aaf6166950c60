//! Background jobs and progress tracking for the blog engine.
//!
//! Provides:
//! - [`JobQueue`]: the queue collaborator (enqueue, fetch job handles)
//! - [`WorkerPool`]: in-process queue backed by tokio workers, with a
//!   completion signal per job
//! - [`JobRegistry`]: queue-side job metadata, evicted after a TTL
//! - [`ProgressTracker`]: records job progress into job metadata, the
//!   persisted task record and the owner's notifications
//! - [`TaskService`]: launches tasks and lists those still running
//! - [`jobs`]: job bodies, currently the post export

pub mod error;
pub mod jobs;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod service;
pub mod tracker;

pub use error::TaskError;
pub use jobs::{ExportSink, FileExportSink, TaskRunner};
pub use pool::{WorkerPool, WorkerPoolConfig};
pub use queue::{JobArgs, JobContext, JobHandle, JobOutcome, JobQueue, JobRunner, JobTicket};
pub use registry::{JobEntry, JobRegistry};
pub use service::TaskService;
pub use tracker::{ProgressTracker, ProgressUpdate};
