//! Queue-side job registry.
//!
//! Tracks metadata of every queued job. Finished jobs stay visible for a
//! TTL and are then evicted; after that [`JobRegistry::get_meta`] returns
//! `None`, which progress readers treat as "done".

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use blog_types::{JobMeta, TaskKind};

use crate::error::TaskError;
use crate::queue::JobOutcome;

/// Registry entry for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEntry {
    pub kind: TaskKind,
    pub meta: JobMeta,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<JobOutcome>,
}

/// Thread-safe registry of queued jobs.
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new job with zero progress.
    ///
    /// If a job with the same id already exists, it will be replaced.
    pub fn register(&self, job_id: &str, kind: TaskKind) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        jobs.insert(
            job_id.to_string(),
            JobEntry {
                kind,
                meta: JobMeta::default(),
                enqueued_at: Utc::now(),
                finished_at: None,
                outcome: None,
            },
        );
    }

    pub fn set_meta(&self, job_id: &str, meta: JobMeta) -> Result<(), TaskError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        match jobs.get_mut(job_id) {
            Some(entry) => {
                entry.meta = meta;
                Ok(())
            }
            None => Err(TaskError::JobNotFound(job_id.to_string())),
        }
    }

    /// Overwrite the metadata unless the job already reached completion.
    ///
    /// The check and the write happen under one lock. Returns `false` when
    /// the job was complete and nothing was written.
    pub fn advance_meta(&self, job_id: &str, meta: JobMeta) -> Result<bool, TaskError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| TaskError::JobNotFound(job_id.to_string()))?;
        if entry.meta.is_complete() {
            return Ok(false);
        }
        entry.meta = meta;
        Ok(true)
    }

    pub fn get_meta(&self, job_id: &str) -> Option<JobMeta> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .map(|entry| entry.meta.clone())
    }

    /// Record how a job ended; starts its TTL.
    pub fn record_finished(&self, job_id: &str, outcome: JobOutcome) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = jobs.get_mut(job_id) {
            entry.finished_at = Some(Utc::now());
            entry.outcome = Some(outcome);
        }
    }

    pub fn get(&self, job_id: &str) -> Option<JobEntry> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(job_id)
    }

    pub fn remove(&self, job_id: &str) -> Option<JobEntry> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id)
    }

    /// Drop jobs that finished more than `ttl` before `now`.
    ///
    /// Returns the number of evicted jobs.
    pub fn evict_expired_at(&self, ttl: Duration, now: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let before = jobs.len();
        jobs.retain(|_, entry| match entry.finished_at {
            Some(finished_at) => now - finished_at < ttl,
            None => true,
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!(evicted, remaining = jobs.len(), "Evicted expired jobs");
        }
        evicted
    }

    pub fn evict_expired(&self, ttl: Duration) -> usize {
        self.evict_expired_at(ttl, Utc::now())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_starts_at_zero() {
        let registry = JobRegistry::new();
        registry.register("job-1", TaskKind::ExportPosts);
        assert_eq!(registry.get_meta("job-1").unwrap().progress, 0);
        assert!(registry.get_meta("job-2").is_none());
    }

    #[test]
    fn test_set_meta_unknown_job() {
        let registry = JobRegistry::new();
        assert!(matches!(
            registry.set_meta("missing", JobMeta::new(10)),
            Err(TaskError::JobNotFound(_))
        ));
    }

    #[test]
    fn test_advance_meta_stops_at_complete() {
        let registry = JobRegistry::new();
        registry.register("job", TaskKind::ExportPosts);

        assert!(registry.advance_meta("job", JobMeta::new(40)).unwrap());
        assert!(registry.advance_meta("job", JobMeta::new(100)).unwrap());
        assert!(!registry.advance_meta("job", JobMeta::new(50)).unwrap());
        assert_eq!(registry.get_meta("job").unwrap().progress, 100);

        assert!(matches!(
            registry.advance_meta("missing", JobMeta::new(10)),
            Err(TaskError::JobNotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_advance_never_leaves_complete() {
        use std::sync::Arc;
        use std::thread;

        for _ in 0..50 {
            let registry = Arc::new(JobRegistry::new());
            registry.register("job", TaskKind::ExportPosts);

            let writers: Vec<_> = [100u8, 50, 70, 30]
                .into_iter()
                .map(|progress| {
                    let registry = registry.clone();
                    thread::spawn(move || {
                        registry.advance_meta("job", JobMeta::new(progress)).unwrap();
                    })
                })
                .collect();
            for writer in writers {
                writer.join().unwrap();
            }

            assert_eq!(registry.get_meta("job").unwrap().progress, 100);
        }
    }

    #[test]
    fn test_evict_only_finished_and_expired() {
        let registry = JobRegistry::new();
        registry.register("running", TaskKind::ExportPosts);
        registry.register("finished", TaskKind::ExportPosts);
        registry.record_finished("finished", JobOutcome::Finished);

        let ttl = Duration::seconds(60);
        assert_eq!(registry.evict_expired_at(ttl, Utc::now()), 0);
        assert_eq!(
            registry.evict_expired_at(ttl, Utc::now() + Duration::seconds(61)),
            1
        );
        assert!(registry.contains("running"));
        assert!(!registry.contains("finished"));
    }

    #[test]
    fn test_record_finished_keeps_outcome() {
        let registry = JobRegistry::new();
        registry.register("job", TaskKind::ExportPosts);
        registry.record_finished("job", JobOutcome::Failed("boom".into()));

        let entry = registry.get("job").unwrap();
        assert_eq!(entry.outcome, Some(JobOutcome::Failed("boom".into())));
        assert!(entry.finished_at.is_some());
    }
}
