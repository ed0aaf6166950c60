//! In-process job queue backed by tokio worker tasks.
//!
//! Jobs are queued on an unbounded mpsc channel. `worker_count` workers
//! share its receiver; each job body runs under `spawn_blocking` because
//! job bodies talk to the primary store synchronously. Every enqueued job
//! gets a oneshot completion signal resolved with its [`JobOutcome`].
//!
//! Jobs enqueued before [`WorkerPool::start`] wait in the channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::error::TaskError;
use crate::queue::{JobArgs, JobContext, JobHandle, JobOutcome, JobQueue, JobRunner, JobTicket};
use crate::registry::JobRegistry;

/// Bounds for the interval between eviction sweeps.
const MIN_JANITOR_INTERVAL: Duration = Duration::from_millis(10);
const MAX_JANITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of concurrent workers
    pub worker_count: usize,

    /// How long finished jobs stay visible in the registry
    pub job_ttl: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            job_ttl: Duration::from_secs(500),
        }
    }
}

impl WorkerPoolConfig {
    pub fn new(worker_count: usize, job_ttl: Duration) -> Self {
        Self {
            worker_count: worker_count.max(1),
            job_ttl,
        }
    }

    fn janitor_interval(&self) -> Duration {
        (self.job_ttl / 2).clamp(MIN_JANITOR_INTERVAL, MAX_JANITOR_INTERVAL)
    }
}

struct QueuedJob {
    context: JobContext,
    completion: oneshot::Sender<JobOutcome>,
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedJob>>>;

/// Worker pool implementing [`JobQueue`].
pub struct WorkerPool {
    config: WorkerPoolConfig,
    registry: Arc<JobRegistry>,
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<QueuedJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    janitor: Mutex<Option<JoinHandle<()>>>,
    is_running: AtomicBool,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            config,
            registry: Arc::new(JobRegistry::new()),
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            workers: Mutex::new(Vec::new()),
            janitor: Mutex::new(None),
            is_running: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Spawn the workers and the eviction janitor.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::AlreadyRunning` on a second call and
    /// `TaskError::QueueClosed` after shutdown.
    pub fn start(&self, runner: Arc<dyn JobRunner>) -> Result<(), TaskError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(TaskError::AlreadyRunning);
        }

        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(TaskError::QueueClosed)?;
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));

        {
            let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            for worker_id in 0..self.config.worker_count {
                workers.push(tokio::spawn(worker_loop(
                    worker_id,
                    receiver.clone(),
                    runner.clone(),
                    self.registry.clone(),
                )));
            }
        }

        let registry = self.registry.clone();
        let ttl = chrono::Duration::from_std(self.config.job_ttl).unwrap_or(chrono::Duration::MAX);
        let period = self.config.janitor_interval();
        let janitor = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                registry.evict_expired(ttl);
            }
        });
        *self.janitor.lock().unwrap_or_else(PoisonError::into_inner) = Some(janitor);

        info!(workers = self.config.worker_count, "Worker pool started");
        Ok(())
    }

    /// Stop accepting jobs, drain the queue and wait for the workers.
    pub async fn shutdown(&self) {
        // Dropping the sender ends every worker loop once the queue drains.
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let workers: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Worker task ended abnormally");
            }
        }

        if let Some(janitor) = self
            .janitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            janitor.abort();
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("Worker pool stopped");
    }
}

impl JobQueue for WorkerPool {
    fn enqueue(&self, job_id: Option<String>, args: JobArgs) -> Result<JobTicket, TaskError> {
        let job_id = job_id.unwrap_or_else(|| Ulid::new().to_string());

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = sender.as_ref().ok_or(TaskError::QueueClosed)?;

        self.registry.register(&job_id, args.kind());

        let (completion, receiver) = oneshot::channel();
        let job = QueuedJob {
            context: JobContext {
                job_id: job_id.clone(),
                args,
            },
            completion,
        };
        if sender.send(job).is_err() {
            self.registry.remove(&job_id);
            return Err(TaskError::QueueClosed);
        }

        debug!(job_id = %job_id, "Job enqueued");
        Ok(JobTicket::new(job_id, receiver))
    }

    fn fetch_job(&self, job_id: &str) -> Option<JobHandle> {
        if self.registry.contains(job_id) {
            Some(JobHandle::new(job_id, self.registry.clone()))
        } else {
            None
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: SharedReceiver,
    runner: Arc<dyn JobRunner>,
    registry: Arc<JobRegistry>,
) {
    debug!(worker_id, "Worker started");
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        let job_id = job.context.job_id.clone();
        debug!(worker_id, job_id = %job_id, "Running job");

        let job_runner = runner.clone();
        let context = job.context;
        let outcome = match tokio::task::spawn_blocking(move || job_runner.run(&context)).await {
            Ok(Ok(())) => JobOutcome::Finished,
            Ok(Err(e)) => {
                warn!(worker_id, job_id = %job_id, error = %e, "Job failed");
                JobOutcome::Failed(e.to_string())
            }
            Err(e) => {
                warn!(worker_id, job_id = %job_id, error = %e, "Job panicked");
                JobOutcome::Failed(format!("job panicked: {}", e))
            }
        };

        registry.record_finished(&job_id, outcome.clone());
        // The ticket may have been dropped; nobody is waiting then.
        let _ = job.completion.send(outcome);
    }
    debug!(worker_id, "Worker stopped");
}
