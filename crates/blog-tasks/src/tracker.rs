//! Job progress tracking.
//!
//! Progress lives in two places: the queue-side [`JobMeta`] of the live
//! job, and the relational side (the owner's `task_progress` notification
//! and the task's `complete` flag). Writers go through
//! [`ProgressTracker::set_progress`]; pollers read
//! [`ProgressTracker::get_progress`].
//!
//! A job moves `Pending(0) -> InProgress(1..99) -> Complete(100)` and never
//! leaves `Complete`.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use blog_storage::Storage;
use blog_types::{JobMeta, NotificationPayload, COMPLETE_PERCENT};

use crate::error::TaskError;
use crate::queue::JobQueue;

/// Result of a progress write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// Progress stored
    Recorded { progress: u8, complete: bool },
    /// The job had already reached 100; nothing was written
    AlreadyComplete,
    /// The queue no longer knows the job; nothing was written
    JobNotFound,
}

/// Reads and writes job progress.
#[derive(Clone)]
pub struct ProgressTracker {
    storage: Arc<Storage>,
    queue: Arc<dyn JobQueue>,
    /// Shared by clones; orders the record and metadata writes of updates
    write_lock: Arc<Mutex<()>>,
}

impl ProgressTracker {
    pub fn new(storage: Arc<Storage>, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            storage,
            queue,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Record `percent` for a job.
    ///
    /// The value is clamped to 0..=100. Unknown or evicted jobs are
    /// reported through [`ProgressUpdate::JobNotFound`], not as errors.
    /// Storage failures while updating the task record are errors.
    ///
    /// The task record is written before the job metadata, so a job whose
    /// metadata reads complete always has a completed task record. A failed
    /// record write leaves the metadata untouched and can be retried.
    pub fn set_progress(&self, job_id: &str, percent: i64) -> Result<ProgressUpdate, TaskError> {
        let progress = JobMeta::clamp_percent(percent);

        let Some(handle) = self.queue.fetch_job(job_id) else {
            warn!(job_id, progress, "Progress update for unknown job");
            return Ok(ProgressUpdate::JobNotFound);
        };

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.get_meta().is_some_and(|meta| meta.is_complete()) {
            debug!(job_id, progress, "Ignoring progress update for completed job");
            return Ok(ProgressUpdate::AlreadyComplete);
        }

        let complete = progress >= COMPLETE_PERCENT;
        self.record_on_task(job_id, progress, complete)?;

        match handle.advance_meta(JobMeta::new(progress)) {
            Ok(true) => {}
            Ok(false) => {
                debug!(job_id, progress, "Job completed during progress update");
                return Ok(ProgressUpdate::AlreadyComplete);
            }
            Err(TaskError::JobNotFound(_)) => {
                warn!(job_id, progress, "Job evicted during progress update");
                return Ok(ProgressUpdate::JobNotFound);
            }
            Err(e) => return Err(e),
        }

        debug!(job_id, progress, complete, "Job progress recorded");
        Ok(ProgressUpdate::Recorded { progress, complete })
    }

    /// Current progress of a job.
    ///
    /// A job the queue cannot find is reported as 100: it expired after
    /// finishing or never existed.
    pub fn get_progress(&self, job_id: &str) -> u8 {
        self.queue
            .fetch_job(job_id)
            .and_then(|handle| handle.get_meta())
            .map(|meta| meta.progress)
            .unwrap_or(COMPLETE_PERCENT)
    }

    fn record_on_task(&self, job_id: &str, progress: u8, complete: bool) -> Result<(), TaskError> {
        let Some(mut task) = self.storage.find_task_by_job_id(job_id)? else {
            debug!(job_id, "No task record for job");
            return Ok(());
        };

        let mut session = self.storage.session();
        session.add_notification(
            task.user_id,
            NotificationPayload::TaskProgress {
                task_id: job_id.to_string(),
                progress,
            },
        )?;
        if complete && !task.complete {
            task.complete = true;
            session.update(task)?;
        }
        session.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    use blog_storage::{CommitListener, PendingChanges, StorageError, TransactionContext};
    use blog_types::{Task, TaskKind, User};

    use crate::pool::{WorkerPool, WorkerPoolConfig};
    use crate::queue::JobArgs;

    struct Fixture {
        _temp: TempDir,
        storage: Arc<Storage>,
        pool: Arc<WorkerPool>,
        tracker: ProgressTracker,
        user_id: u64,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::default()));
        let tracker = ProgressTracker::new(storage.clone(), pool.clone());

        let mut session = storage.session();
        let user_id = session
            .add(User::new("susan", "susan@example.com"))
            .unwrap();
        session.commit().unwrap();

        Fixture {
            _temp: temp,
            storage,
            pool,
            tracker,
            user_id,
        }
    }

    /// Enqueue a job (workers are never started) plus its task record.
    fn queued_task(f: &Fixture) -> String {
        let ticket = f
            .pool
            .enqueue(None, JobArgs::ExportPosts { user_id: f.user_id })
            .unwrap();
        let mut session = f.storage.session();
        session
            .add(Task::new(
                ticket.job_id.clone(),
                TaskKind::ExportPosts,
                "Exporting posts...",
                f.user_id,
            ))
            .unwrap();
        session.commit().unwrap();
        ticket.job_id
    }

    fn progress_notifications(f: &Fixture) -> Vec<NotificationPayload> {
        f.storage
            .notifications_for_user(f.user_id)
            .unwrap()
            .into_iter()
            .map(|n| n.payload)
            .collect()
    }

    #[test]
    fn test_new_job_is_pending() {
        let f = fixture();
        let job_id = queued_task(&f);
        assert_eq!(f.tracker.get_progress(&job_id), 0);
    }

    #[test]
    fn test_set_progress_records_everywhere() {
        let f = fixture();
        let job_id = queued_task(&f);

        let update = f.tracker.set_progress(&job_id, 40).unwrap();
        assert_eq!(
            update,
            ProgressUpdate::Recorded {
                progress: 40,
                complete: false
            }
        );
        assert_eq!(f.tracker.get_progress(&job_id), 40);
        assert_eq!(
            progress_notifications(&f),
            vec![NotificationPayload::TaskProgress {
                task_id: job_id.clone(),
                progress: 40
            }]
        );

        let task = f.storage.find_task_by_job_id(&job_id).unwrap().unwrap();
        assert!(!task.complete);
    }

    #[test]
    fn test_notification_replaced_on_each_update() {
        let f = fixture();
        let job_id = queued_task(&f);

        f.tracker.set_progress(&job_id, 10).unwrap();
        f.tracker.set_progress(&job_id, 20).unwrap();
        f.tracker.set_progress(&job_id, 30).unwrap();

        let notes = progress_notifications(&f);
        assert_eq!(notes.len(), 1);
        assert_eq!(
            notes[0],
            NotificationPayload::TaskProgress {
                task_id: job_id,
                progress: 30
            }
        );
    }

    #[test]
    fn test_clamp_and_no_regression_after_complete() {
        let f = fixture();
        let job_id = queued_task(&f);

        let update = f.tracker.set_progress(&job_id, 150).unwrap();
        assert_eq!(
            update,
            ProgressUpdate::Recorded {
                progress: 100,
                complete: true
            }
        );
        assert!(f.storage.find_task_by_job_id(&job_id).unwrap().unwrap().complete);

        assert_eq!(
            f.tracker.set_progress(&job_id, 50).unwrap(),
            ProgressUpdate::AlreadyComplete
        );
        assert_eq!(f.tracker.get_progress(&job_id), 100);
    }

    #[test]
    fn test_concurrent_updates_never_leave_complete() {
        let f = fixture();
        for _ in 0..20 {
            let job_id = queued_task(&f);
            std::thread::scope(|scope| {
                for percent in [100, 50, 70, 30] {
                    let tracker = f.tracker.clone();
                    let job_id = job_id.clone();
                    scope.spawn(move || {
                        tracker.set_progress(&job_id, percent).unwrap();
                    });
                }
            });

            assert_eq!(f.tracker.get_progress(&job_id), 100);
            assert!(f.storage.find_task_by_job_id(&job_id).unwrap().unwrap().complete);
        }
    }

    /// Fails the next commit it sees.
    #[derive(Default)]
    struct FailNextCommit {
        armed: AtomicBool,
    }

    impl CommitListener for FailNextCommit {
        fn name(&self) -> &str {
            "fail-next"
        }

        fn before_commit(
            &self,
            _pending: &PendingChanges,
            _tx: &mut TransactionContext,
        ) -> Result<(), StorageError> {
            if self.armed.swap(false, Ordering::SeqCst) {
                return Err(StorageError::InvalidState("disk full".to_string()));
            }
            Ok(())
        }

        fn after_commit(&self, _tx: &mut TransactionContext) {}
    }

    #[test]
    fn test_failed_completion_can_be_retried() {
        let f = fixture();
        let job_id = queued_task(&f);
        f.tracker.set_progress(&job_id, 60).unwrap();

        let failer = Arc::new(FailNextCommit::default());
        f.storage.register_listener(failer.clone()).unwrap();
        failer.armed.store(true, Ordering::SeqCst);

        assert!(f.tracker.set_progress(&job_id, 100).is_err());
        assert_eq!(f.tracker.get_progress(&job_id), 60);
        assert!(!f.storage.find_task_by_job_id(&job_id).unwrap().unwrap().complete);

        assert_eq!(
            f.tracker.set_progress(&job_id, 100).unwrap(),
            ProgressUpdate::Recorded {
                progress: 100,
                complete: true
            }
        );
        assert_eq!(f.tracker.get_progress(&job_id), 100);
        assert!(f.storage.find_task_by_job_id(&job_id).unwrap().unwrap().complete);
    }

    #[test]
    fn test_negative_percent_clamps_to_zero() {
        let f = fixture();
        let job_id = queued_task(&f);

        f.tracker.set_progress(&job_id, -20).unwrap();
        assert_eq!(f.tracker.get_progress(&job_id), 0);
    }

    #[test]
    fn test_unknown_job() {
        let f = fixture();
        assert_eq!(
            f.tracker.set_progress("no-such-job", 50).unwrap(),
            ProgressUpdate::JobNotFound
        );
        assert_eq!(f.tracker.get_progress("no-such-job"), 100);
        assert!(progress_notifications(&f).is_empty());
    }

    #[test]
    fn test_job_without_task_record() {
        let f = fixture();
        let ticket = f
            .pool
            .enqueue(None, JobArgs::ExportPosts { user_id: f.user_id })
            .unwrap();

        let update = f.tracker.set_progress(&ticket.job_id, 60).unwrap();
        assert!(matches!(update, ProgressUpdate::Recorded { progress: 60, .. }));
        assert!(progress_notifications(&f).is_empty());
    }
}
