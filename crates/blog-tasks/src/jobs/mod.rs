//! Job bodies executed by the worker pool.
//!
//! # Available Jobs
//!
//! - **export_posts**: serialize all of a user's posts to JSON and hand
//!   the file to an [`ExportSink`]

pub mod export;

use std::sync::Arc;

use blog_storage::Storage;

use crate::error::TaskError;
use crate::queue::{JobArgs, JobContext, JobRunner};
use crate::tracker::ProgressTracker;

pub use export::{export_posts, ExportSink, FileExportSink};

/// Dispatches queued jobs to their bodies.
pub struct TaskRunner {
    storage: Arc<Storage>,
    tracker: ProgressTracker,
    sink: Arc<dyn ExportSink>,
}

impl TaskRunner {
    pub fn new(storage: Arc<Storage>, tracker: ProgressTracker, sink: Arc<dyn ExportSink>) -> Self {
        Self {
            storage,
            tracker,
            sink,
        }
    }
}

impl JobRunner for TaskRunner {
    fn run(&self, job: &JobContext) -> Result<(), TaskError> {
        match &job.args {
            JobArgs::ExportPosts { user_id } => export_posts(
                &self.storage,
                &self.tracker,
                self.sink.as_ref(),
                &job.job_id,
                *user_id,
            ),
        }
    }
}
