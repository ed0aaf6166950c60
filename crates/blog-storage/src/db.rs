//! RocksDB wrapper for the blog primary store.
//!
//! Provides:
//! - Database open with column family setup
//! - Per-table id sequences loaded from the highest stored key
//! - Commit listener registration
//! - Single-row, id-set and table-scan reads

use rocksdb::{ColumnFamily, IteratorMode, Options, DB};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

use blog_types::{Entity, EntityId, Model, Notification, Post, Task, User};

use crate::column_families::{build_cf_descriptors, ALL_CF_NAMES, CF_UNIQUE, TABLE_CF_NAMES};
use crate::error::StorageError;
use crate::keys::{RowKey, UniqueKey};
use crate::listener::{CommitListener, ListenerHandle};
use crate::session::Session;

struct RegisteredListener {
    handle: ListenerHandle,
    listener: Arc<dyn CommitListener>,
}

/// Main storage interface for the blog engine
pub struct Storage {
    pub(crate) db: DB,
    /// Next id per table
    sequences: HashMap<&'static str, AtomicU64>,
    listeners: RwLock<Vec<RegisteredListener>>,
    next_listener_id: AtomicU64,
    /// Serializes constraint checks and batch writes across sessions
    commit_lock: Mutex<()>,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let db = DB::open_cf_descriptors(&db_opts, path, build_cf_descriptors())?;

        let mut sequences = HashMap::new();
        for table in TABLE_CF_NAMES {
            let next = Self::load_sequence(&db, table)?;
            debug!(table = %table, next_id = next, "Loaded id sequence");
            sequences.insert(*table, AtomicU64::new(next));
        }

        Ok(Self {
            db,
            sequences,
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            commit_lock: Mutex::new(()),
        })
    }

    /// Load the next id of a table from its highest existing key
    fn load_sequence(db: &DB, table: &str) -> Result<EntityId, StorageError> {
        let cf = db
            .cf_handle(table)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(table.to_string()))?;

        let mut iter = db.iterator_cf(cf, IteratorMode::End);
        if let Some(result) = iter.next() {
            let (key, _) = result?;
            return Ok(RowKey::from_bytes(&key)?.id + 1);
        }
        Ok(1)
    }

    pub(crate) fn cf(&self, name: &str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    fn sequence(&self, table: &str) -> Result<&AtomicU64, StorageError> {
        self.sequences
            .get(table)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(table.to_string()))
    }

    /// Reserve the next id of a table. Reserved ids are never reused.
    pub(crate) fn next_id(&self, table: &str) -> Result<EntityId, StorageError> {
        Ok(self.sequence(table)?.fetch_add(1, Ordering::SeqCst))
    }

    /// Advance a table's sequence past an explicitly chosen id
    pub(crate) fn observe_id(&self, table: &str, id: EntityId) -> Result<(), StorageError> {
        self.sequence(table)?.fetch_max(id + 1, Ordering::SeqCst);
        Ok(())
    }

    pub(crate) fn lock_commits(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        self.commit_lock
            .lock()
            .map_err(|_| StorageError::InvalidState("commit lock poisoned".to_string()))
    }

    /// Start a unit of work
    pub fn session(&self) -> Session<'_> {
        Session::new(self)
    }

    // ===== Commit listeners =====

    /// Register a listener for every subsequent commit
    pub fn register_listener(
        &self,
        listener: Arc<dyn CommitListener>,
    ) -> Result<ListenerHandle, StorageError> {
        let handle = ListenerHandle(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        let mut listeners = self
            .listeners
            .write()
            .map_err(|_| StorageError::InvalidState("listener registry poisoned".to_string()))?;
        info!(listener = %listener.name(), handle = handle.0, "Registered commit listener");
        listeners.push(RegisteredListener { handle, listener });
        Ok(handle)
    }

    /// Remove a listener. Returns false if the handle was unknown.
    pub fn unregister_listener(&self, handle: ListenerHandle) -> Result<bool, StorageError> {
        let mut listeners = self
            .listeners
            .write()
            .map_err(|_| StorageError::InvalidState("listener registry poisoned".to_string()))?;
        let before = listeners.len();
        listeners.retain(|r| r.handle != handle);
        let removed = listeners.len() != before;
        if removed {
            info!(handle = handle.0, "Unregistered commit listener");
        }
        Ok(removed)
    }

    /// Listeners in registration order
    pub(crate) fn listeners_snapshot(&self) -> Result<Vec<Arc<dyn CommitListener>>, StorageError> {
        let listeners = self
            .listeners
            .read()
            .map_err(|_| StorageError::InvalidState("listener registry poisoned".to_string()))?;
        Ok(listeners.iter().map(|r| r.listener.clone()).collect())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or(0)
    }

    // ===== Reads =====

    /// Get a single row of any table
    pub fn get_entity(&self, table: &str, id: EntityId) -> Result<Option<Entity>, StorageError> {
        let cf = self.cf(table)?;
        match self.db.get_cf(cf, RowKey::new(id).to_bytes())? {
            Some(bytes) => Ok(Some(Entity::from_row_bytes(table, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a single typed row
    pub fn get<T: Model>(&self, id: EntityId) -> Result<Option<T>, StorageError> {
        Ok(self.get_entity(T::TABLE, id)?.and_then(T::from_entity))
    }

    pub(crate) fn row_exists(&self, table: &str, id: EntityId) -> Result<bool, StorageError> {
        let cf = self.cf(table)?;
        Ok(self.db.get_pinned_cf(cf, RowKey::new(id).to_bytes())?.is_some())
    }

    /// Fetch the rows for a set of ids.
    ///
    /// Rows come back in primary-key order; missing ids are skipped and
    /// duplicate ids are fetched once.
    pub fn fetch_by_ids(&self, table: &str, ids: &[EntityId]) -> Result<Vec<Entity>, StorageError> {
        let cf = self.cf(table)?;

        let mut sorted: Vec<EntityId> = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut results = Vec::with_capacity(sorted.len());
        for id in sorted {
            if let Some(bytes) = self.db.get_cf(cf, RowKey::new(id).to_bytes())? {
                results.push(Entity::from_row_bytes(table, &bytes)?);
            }
        }

        debug!(table = %table, requested = ids.len(), found = results.len(), "Fetched rows by id");
        Ok(results)
    }

    /// All rows of a table in primary-key order
    pub fn scan_entities(&self, table: &str) -> Result<Vec<Entity>, StorageError> {
        let cf = self.cf(table)?;
        let mut results = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            results.push(Entity::from_row_bytes(table, &value)?);
        }
        Ok(results)
    }

    /// All typed rows in primary-key order
    pub fn scan<T: Model>(&self) -> Result<Vec<T>, StorageError> {
        Ok(self
            .scan_entities(T::TABLE)?
            .into_iter()
            .filter_map(T::from_entity)
            .collect())
    }

    /// Owner of a unique value, if claimed
    pub fn unique_owner(&self, key: &UniqueKey) -> Result<Option<EntityId>, StorageError> {
        let cf = self.cf(CF_UNIQUE)?;
        match self.db.get_cf(cf, key.to_bytes())? {
            Some(bytes) => Ok(Some(RowKey::from_bytes(&bytes)?.id)),
            None => Ok(None),
        }
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        match self.unique_owner(&UniqueKey::new("user", "username", username))? {
            Some(id) => self.get::<User>(id),
            None => Ok(None),
        }
    }

    pub fn find_task_by_job_id(&self, job_id: &str) -> Result<Option<Task>, StorageError> {
        match self.unique_owner(&UniqueKey::new("task", "job_id", job_id))? {
            Some(id) => self.get::<Task>(id),
            None => Ok(None),
        }
    }

    /// Posts written by a user, oldest first
    pub fn posts_by_user(&self, user_id: EntityId) -> Result<Vec<Post>, StorageError> {
        let mut posts: Vec<Post> = self
            .scan::<Post>()?
            .into_iter()
            .filter(|p| p.user_id == user_id)
            .collect();
        posts.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(posts)
    }

    pub fn notifications_for_user(
        &self,
        user_id: EntityId,
    ) -> Result<Vec<Notification>, StorageError> {
        Ok(self
            .scan::<Notification>()?
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect())
    }

    pub fn tasks_for_user(&self, user_id: EntityId) -> Result<Vec<Task>, StorageError> {
        Ok(self
            .scan::<Task>()?
            .into_iter()
            .filter(|t| t.user_id == user_id)
            .collect())
    }

    // ===== Admin Operations =====

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            user_count: self.count_rows(User::TABLE)?,
            post_count: self.count_rows(Post::TABLE)?,
            task_count: self.count_rows(Task::TABLE)?,
            notification_count: self.count_rows(Notification::TABLE)?,
            disk_usage_bytes: self.get_disk_usage(),
        })
    }

    fn count_rows(&self, table: &str) -> Result<u64, StorageError> {
        let cf = self.cf(table)?;
        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn get_disk_usage(&self) -> u64 {
        std::fs::read_dir(self.db.path())
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

/// Statistics about the storage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StorageStats {
    pub user_count: u64,
    pub post_count: u64,
    pub task_count: u64,
    pub notification_count: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}
