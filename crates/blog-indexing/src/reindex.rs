//! Full reindex of one entity type.
//!
//! The only recovery path when the index fell behind the store, e.g. after
//! a crash between a commit and its synchronization. Every stored entity
//! is upserted again; upserts are idempotent so existing documents are
//! simply overwritten.

use tracing::{info, warn};

use blog_storage::Storage;
use blog_types::{Indexable, Model};

use crate::error::IndexingError;
use crate::synchronizer::IndexSynchronizer;

/// Configuration for reindex operations.
#[derive(Debug, Clone)]
pub struct ReindexConfig {
    /// Number of documents to process before reporting progress.
    pub batch_size: usize,
    /// Whether to continue on individual document errors.
    pub continue_on_error: bool,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            continue_on_error: true,
        }
    }
}

impl ReindexConfig {
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
}

/// Progress tracking for reindex operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReindexProgress {
    /// Entities found in the store
    pub total: u64,
    /// Entities processed so far
    pub total_processed: u64,
    pub indexed: u64,
    pub errors: u64,
    pub completed: bool,
}

impl ReindexProgress {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record_indexed(&mut self) {
        self.indexed += 1;
        self.total_processed += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
        self.total_processed += 1;
    }

    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    /// Percent of entities processed
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (self.total_processed * 100 / self.total).min(100) as u8
    }
}

/// Trait for receiving reindex progress updates.
pub trait ProgressCallback: Send {
    /// Called after each batch of documents is processed.
    fn on_progress(&self, progress: &ReindexProgress);
}

/// A no-op progress callback for when progress reporting isn't needed.
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn on_progress(&self, _progress: &ReindexProgress) {}
}

/// A callback that logs progress at info level.
pub struct LoggingProgressCallback;

impl ProgressCallback for LoggingProgressCallback {
    fn on_progress(&self, progress: &ReindexProgress) {
        info!(
            processed = progress.total_processed,
            total = progress.total,
            errors = progress.errors,
            percent = progress.percent(),
            "Reindex progress"
        );
    }
}

/// Re-upsert every stored entity of type `T` and commit once.
pub fn reindex<T: Model + Indexable, P: ProgressCallback>(
    storage: &Storage,
    synchronizer: &IndexSynchronizer,
    config: &ReindexConfig,
    progress_callback: &P,
) -> Result<ReindexProgress, IndexingError> {
    if !synchronizer.is_enabled() {
        return Err(IndexingError::Disabled);
    }

    let entities = storage.scan::<T>()?;
    let mut progress = ReindexProgress::new(entities.len() as u64);
    info!(index = %T::TABLE, count = entities.len(), "Starting reindex");

    let batch_size = config.batch_size.max(1) as u64;
    for entity in &entities {
        match synchronizer.index_upsert(entity.table_name(), &entity.to_index_document()) {
            Ok(()) => progress.record_indexed(),
            Err(e) => {
                if config.continue_on_error {
                    warn!(index = %T::TABLE, id = entity.entity_id(), error = %e, "Failed to reindex entity");
                    progress.record_error();
                } else {
                    return Err(e);
                }
            }
        }

        if progress.total_processed % batch_size == 0 {
            progress_callback.on_progress(&progress);
        }
    }

    synchronizer.commit()?;
    progress.mark_completed();
    progress_callback.on_progress(&progress);

    info!(
        index = %T::TABLE,
        indexed = progress.indexed,
        errors = progress.errors,
        "Reindex complete"
    );
    Ok(progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blog_search::{SearchIndexConfig, TantivyTextIndex, TextIndex};
    use blog_types::{Post, User};
    use chrono::Utc;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct RecordingCallback {
        seen: Mutex<Vec<ReindexProgress>>,
    }

    impl ProgressCallback for RecordingCallback {
        fn on_progress(&self, progress: &ReindexProgress) {
            self.seen.lock().unwrap().push(progress.clone());
        }
    }

    fn seed(storage: &Storage, count: u64) {
        let mut session = storage.session();
        let user_id = session.add(User::new("susan", "s@example.com")).unwrap();
        for i in 0..count {
            session
                .add(Post::new(user_id, format!("recovered post {}", i), Utc::now()))
                .unwrap();
        }
        session.commit().unwrap();
    }

    #[test]
    fn test_reindex_restores_index() {
        let db_dir = TempDir::new().unwrap();
        let index_dir = TempDir::new().unwrap();
        let storage = Storage::open(db_dir.path()).unwrap();
        seed(&storage, 5);

        let index =
            Arc::new(TantivyTextIndex::open(SearchIndexConfig::new(index_dir.path())).unwrap());
        let sync = IndexSynchronizer::new(Some(index.clone()));
        assert_eq!(index.query("post", "recovered", 0, 10).unwrap().total, 0);

        let callback = RecordingCallback {
            seen: Mutex::new(Vec::new()),
        };
        let config = ReindexConfig::default().with_batch_size(2);
        let progress = reindex::<Post, _>(&storage, &sync, &config, &callback).unwrap();

        assert_eq!(progress.indexed, 5);
        assert!(progress.completed);
        assert_eq!(progress.percent(), 100);
        assert_eq!(index.query("post", "recovered", 0, 10).unwrap().total, 5);

        let seen = callback.seen.lock().unwrap();
        let processed: Vec<u64> = seen.iter().map(|p| p.total_processed).collect();
        assert_eq!(processed, vec![2, 4, 5]);
        assert!(seen.last().unwrap().completed);
    }

    #[test]
    fn test_reindex_twice_does_not_duplicate() {
        let db_dir = TempDir::new().unwrap();
        let index_dir = TempDir::new().unwrap();
        let storage = Storage::open(db_dir.path()).unwrap();
        seed(&storage, 3);

        let index =
            Arc::new(TantivyTextIndex::open(SearchIndexConfig::new(index_dir.path())).unwrap());
        let sync = IndexSynchronizer::new(Some(index.clone()));
        let config = ReindexConfig::default();
        reindex::<Post, _>(&storage, &sync, &config, &NoOpProgressCallback).unwrap();
        reindex::<Post, _>(&storage, &sync, &config, &NoOpProgressCallback).unwrap();

        assert_eq!(index.query("post", "recovered", 0, 10).unwrap().total, 3);
    }

    #[test]
    fn test_reindex_requires_index() {
        let db_dir = TempDir::new().unwrap();
        let storage = Storage::open(db_dir.path()).unwrap();
        let result = reindex::<Post, _>(
            &storage,
            &IndexSynchronizer::disabled(),
            &ReindexConfig::default(),
            &NoOpProgressCallback,
        );
        assert!(matches!(result, Err(IndexingError::Disabled)));
    }

    #[test]
    fn test_percent_of_empty_store() {
        assert_eq!(ReindexProgress::new(0).percent(), 100);
        let mut progress = ReindexProgress::new(4);
        progress.record_indexed();
        assert_eq!(progress.percent(), 25);
    }
}
