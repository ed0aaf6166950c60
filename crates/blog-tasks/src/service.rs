//! Task launching and lookup.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};
use ulid::Ulid;

use blog_storage::Storage;
use blog_types::{EntityId, Task, TaskKind};

use crate::error::TaskError;
use crate::queue::{JobArgs, JobQueue, JobTicket};
use crate::tracker::ProgressTracker;

/// Launches background tasks and tracks their records.
#[derive(Clone)]
pub struct TaskService {
    storage: Arc<Storage>,
    queue: Arc<dyn JobQueue>,
    tracker: ProgressTracker,
    /// Held while launching or reconciling so a record never outruns its job
    launch_lock: Arc<Mutex<()>>,
}

impl TaskService {
    pub fn new(storage: Arc<Storage>, queue: Arc<dyn JobQueue>) -> Self {
        let tracker = ProgressTracker::new(storage.clone(), queue.clone());
        Self {
            storage,
            queue,
            tracker,
            launch_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Enqueue a job of `kind` for a user and persist its task record.
    ///
    /// The record is committed before the job is queued so a fast worker
    /// always finds it. If queueing fails the record is removed again.
    ///
    /// # Errors
    ///
    /// `TaskError::AlreadyInProgress` when the user already has an
    /// unfinished task of the same kind.
    pub fn launch_task(
        &self,
        user_id: EntityId,
        kind: TaskKind,
        description: &str,
    ) -> Result<(Task, JobTicket), TaskError> {
        let _guard = self.launch_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self
            .unfinished_tasks(user_id)?
            .iter()
            .any(|t| t.name == kind)
        {
            return Err(TaskError::AlreadyInProgress(kind));
        }

        let job_id = Ulid::new().to_string();
        let mut task = Task::new(job_id.clone(), kind, description, user_id);

        let mut session = self.storage.session();
        task.id = session.add(task.clone())?;
        session.commit()?;

        match self
            .queue
            .enqueue(Some(job_id.clone()), JobArgs::for_kind(kind, user_id))
        {
            Ok(ticket) => {
                info!(job_id = %job_id, user_id, kind = %kind, "Task launched");
                Ok((task, ticket))
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Failed to enqueue task, removing record");
                let mut session = self.storage.session();
                session.delete(task)?;
                session.commit()?;
                Err(e)
            }
        }
    }

    /// Unfinished tasks of a user.
    ///
    /// A record whose job the queue no longer knows is finished: the job
    /// expired or died with an earlier process. Such records are marked
    /// complete and left out.
    pub fn tasks_in_progress(&self, user_id: EntityId) -> Result<Vec<Task>, TaskError> {
        let _guard = self.launch_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.unfinished_tasks(user_id)
    }

    /// The user's unfinished task of `kind`, if any.
    pub fn task_in_progress(
        &self,
        user_id: EntityId,
        kind: TaskKind,
    ) -> Result<Option<Task>, TaskError> {
        Ok(self
            .tasks_in_progress(user_id)?
            .into_iter()
            .find(|t| t.name == kind))
    }

    fn unfinished_tasks(&self, user_id: EntityId) -> Result<Vec<Task>, TaskError> {
        let (live, orphaned): (Vec<Task>, Vec<Task>) = self
            .storage
            .tasks_for_user(user_id)?
            .into_iter()
            .filter(|t| !t.complete)
            .partition(|t| self.queue.fetch_job(&t.job_id).is_some());

        if !orphaned.is_empty() {
            let mut session = self.storage.session();
            for mut task in orphaned {
                warn!(job_id = %task.job_id, user_id, "Closing task whose job is gone");
                task.complete = true;
                session.update(task)?;
            }
            session.commit()?;
        }
        Ok(live)
    }

    pub fn get_progress(&self, job_id: &str) -> u8 {
        self.tracker.get_progress(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use blog_storage::StorageError;
    use blog_types::User;

    use crate::pool::{WorkerPool, WorkerPoolConfig};

    fn setup() -> (TempDir, Arc<Storage>, Arc<WorkerPool>, TaskService, EntityId) {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp.path()).unwrap());
        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::default()));
        let service = TaskService::new(storage.clone(), pool.clone());

        let mut session = storage.session();
        let user_id = session.add(User::new("john", "john@example.com")).unwrap();
        session.commit().unwrap();

        (temp, storage, pool, service, user_id)
    }

    #[test]
    fn test_launch_persists_and_enqueues() {
        let (_temp, storage, pool, service, user_id) = setup();

        let (task, ticket) = service
            .launch_task(user_id, TaskKind::ExportPosts, "Exporting posts...")
            .unwrap();
        assert_eq!(task.job_id, ticket.job_id);
        assert!(task.id > 0);
        assert!(pool.fetch_job(&task.job_id).is_some());

        let stored = storage.find_task_by_job_id(&task.job_id).unwrap().unwrap();
        assert_eq!(stored, task);
        assert_eq!(service.get_progress(&task.job_id), 0);
    }

    #[test]
    fn test_second_launch_rejected_while_running() {
        let (_temp, _storage, _pool, service, user_id) = setup();

        service
            .launch_task(user_id, TaskKind::ExportPosts, "Exporting posts...")
            .unwrap();
        let err = service
            .launch_task(user_id, TaskKind::ExportPosts, "Exporting posts...")
            .unwrap_err();
        assert!(matches!(err, TaskError::AlreadyInProgress(TaskKind::ExportPosts)));
    }

    #[test]
    fn test_completed_task_leaves_in_progress_list() {
        let (_temp, _storage, _pool, service, user_id) = setup();

        let (task, _ticket) = service
            .launch_task(user_id, TaskKind::ExportPosts, "Exporting posts...")
            .unwrap();
        assert_eq!(service.tasks_in_progress(user_id).unwrap().len(), 1);

        service.tracker().set_progress(&task.job_id, 100).unwrap();
        assert!(service.tasks_in_progress(user_id).unwrap().is_empty());
        assert!(service
            .task_in_progress(user_id, TaskKind::ExportPosts)
            .unwrap()
            .is_none());

        // A finished export can be launched again
        service
            .launch_task(user_id, TaskKind::ExportPosts, "Exporting posts...")
            .unwrap();
    }

    #[test]
    fn test_task_left_by_dead_process_is_closed() {
        let (_temp, storage, _pool, service, user_id) = setup();

        let mut session = storage.session();
        session
            .add(Task::new(
                "01OLDJOB",
                TaskKind::ExportPosts,
                "Exporting posts...",
                user_id,
            ))
            .unwrap();
        session.commit().unwrap();
        assert_eq!(service.get_progress("01OLDJOB"), 100);

        let (task, _ticket) = service
            .launch_task(user_id, TaskKind::ExportPosts, "Exporting posts...")
            .unwrap();
        assert_ne!(task.job_id, "01OLDJOB");

        let old = storage.find_task_by_job_id("01OLDJOB").unwrap().unwrap();
        assert!(old.complete);
        let running = service.tasks_in_progress(user_id).unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].job_id, task.job_id);
    }

    #[test]
    fn test_launch_for_unknown_user_fails() {
        let (_temp, storage, _pool, service, _user_id) = setup();

        let err = service
            .launch_task(999, TaskKind::ExportPosts, "Exporting posts...")
            .unwrap_err();
        assert!(matches!(
            err,
            TaskError::Storage(StorageError::Constraint(_))
        ));
        assert!(storage.tasks_for_user(999).unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_enqueue_failure_removes_record() {
        let (_temp, storage, pool, service, user_id) = setup();
        pool.shutdown().await;

        let err = service
            .launch_task(user_id, TaskKind::ExportPosts, "Exporting posts...")
            .unwrap_err();
        assert!(matches!(err, TaskError::QueueClosed));
        assert!(storage.tasks_for_user(user_id).unwrap().is_empty());
    }
}
