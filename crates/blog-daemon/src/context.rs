//! Process context.
//!
//! Everything a command needs, opened once per process. The search sync
//! listener is registered here exactly once and its handle is kept so
//! shutdown can unregister it.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use blog_indexing::{IndexSynchronizer, SearchQueryEngine, SearchSyncListener};
use blog_search::{SearchIndexConfig, TantivyTextIndex, TextIndex};
use blog_storage::{ListenerHandle, Storage};
use blog_tasks::{FileExportSink, TaskRunner, TaskService, WorkerPool, WorkerPoolConfig};
use blog_types::post::POST_SEARCHABLE_FIELDS;
use blog_types::{Model, Post, Settings};

pub struct AppContext {
    pub settings: Settings,
    pub storage: Arc<Storage>,
    pub synchronizer: Arc<IndexSynchronizer>,
    pub engine: SearchQueryEngine,
    pub pool: Arc<WorkerPool>,
    pub tasks: TaskService,
    listener: ListenerHandle,
}

impl AppContext {
    /// Open the store and index and wire them together.
    pub fn open(settings: Settings) -> Result<Self> {
        let db_path = settings.expanded_db_path();
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        info!(path = %db_path.display(), "Opening storage");
        let storage = Arc::new(Storage::open(&db_path).context("Failed to open storage")?);

        let text_index: Option<Arc<dyn TextIndex>> = if settings.search_enabled {
            let index_path = settings.expanded_search_index_path();
            info!(path = %index_path.display(), "Opening search index");
            let config = SearchIndexConfig::new(index_path)
                .with_memory_mb(settings.index_writer_memory_mb);
            let index = TantivyTextIndex::open(config).context("Failed to open search index")?;
            index
                .ensure_index(Post::TABLE, POST_SEARCHABLE_FIELDS)
                .context("Failed to open post index")?;
            Some(Arc::new(index) as Arc<dyn TextIndex>)
        } else {
            info!("Search disabled, index updates are skipped");
            None
        };

        let synchronizer = Arc::new(IndexSynchronizer::new(text_index));
        let listener = storage
            .register_listener(Arc::new(SearchSyncListener::new(synchronizer.clone())))
            .context("Failed to register search listener")?;

        let engine = SearchQueryEngine::new(storage.clone(), synchronizer.clone());

        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::new(
            settings.worker_count,
            Duration::from_secs(settings.job_ttl_secs),
        )));
        let tasks = TaskService::new(storage.clone(), pool.clone());

        Ok(Self {
            settings,
            storage,
            synchronizer,
            engine,
            pool,
            tasks,
            listener,
        })
    }

    /// Start the worker pool. Needs a running tokio runtime.
    pub fn start_workers(&self) -> Result<()> {
        let sink = Arc::new(FileExportSink::new(self.settings.expanded_export_dir()));
        let runner = Arc::new(TaskRunner::new(
            self.storage.clone(),
            self.tasks.tracker().clone(),
            sink,
        ));
        self.pool
            .start(runner)
            .context("Failed to start worker pool")?;
        Ok(())
    }

    /// Drain workers, detach the listener and flush the store.
    pub async fn shutdown(self) -> Result<()> {
        if self.pool.is_running() {
            self.pool.shutdown().await;
        }
        self.storage
            .unregister_listener(self.listener)
            .context("Failed to unregister search listener")?;
        self.storage.flush().context("Failed to flush storage")?;
        Ok(())
    }
}
