//! Tantivy index management.
//!
//! One [`EntityIndex`] per index name, each in its own directory under
//! the configured root.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};
use tracing::{debug, info};

use crate::error::SearchError;
use crate::schema::EntitySchema;

/// Default memory budget for IndexWriter (50MB)
const DEFAULT_WRITER_MEMORY_MB: usize = 50;

/// Search index configuration
#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    /// Root directory; each index lives in `<root>/<index_name>`
    pub root_path: PathBuf,
    /// Memory budget for each writer in MB
    pub writer_memory_mb: usize,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("./search-index"),
            writer_memory_mb: DEFAULT_WRITER_MEMORY_MB,
        }
    }
}

impl SearchIndexConfig {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            writer_memory_mb: DEFAULT_WRITER_MEMORY_MB,
        }
    }

    pub fn with_memory_mb(mut self, mb: usize) -> Self {
        self.writer_memory_mb = mb;
        self
    }

    /// Directory of a named index
    pub fn index_path(&self, name: &str) -> PathBuf {
        self.root_path.join(name)
    }
}

/// A named Tantivy index with its writer and reader.
///
/// Documents are not visible to queries until [`EntityIndex::commit`].
pub struct EntityIndex {
    name: String,
    path: PathBuf,
    index: Index,
    schema: EntitySchema,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    dirty: AtomicBool,
}

impl EntityIndex {
    /// Open the index at `path`, creating it with `searchable_fields` if
    /// absent. An existing index must contain every requested field.
    pub fn open_or_create(
        name: &str,
        path: &Path,
        searchable_fields: &[&str],
        writer_memory_mb: usize,
    ) -> Result<Self, SearchError> {
        let index = open_or_create_index(path, searchable_fields)?;
        let schema = EntitySchema::from_schema(index.schema())?;
        schema.ensure_fields(searchable_fields.iter().copied())?;
        Self::from_index(name, path, index, schema, writer_memory_mb)
    }

    /// Open an index that already exists on disk.
    pub fn open_existing(
        name: &str,
        path: &Path,
        writer_memory_mb: usize,
    ) -> Result<Self, SearchError> {
        let index = Index::open_in_dir(path)?;
        let schema = EntitySchema::from_schema(index.schema())?;
        Self::from_index(name, path, index, schema, writer_memory_mb)
    }

    fn from_index(
        name: &str,
        path: &Path,
        index: Index,
        schema: EntitySchema,
        writer_memory_mb: usize,
    ) -> Result<Self, SearchError> {
        let memory_budget = writer_memory_mb * 1024 * 1024;
        let writer = index.writer_with_num_threads(1, memory_budget)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        info!(index = %name, path = ?path, "Opened entity index");

        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            index,
            schema,
            writer: Mutex::new(writer),
            reader,
            dirty: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Get the underlying Tantivy index
    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    pub fn writer(&self) -> Result<MutexGuard<'_, IndexWriter>, SearchError> {
        self.writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Commit pending changes and reload the reader.
    ///
    /// Returns None when there was nothing to commit.
    pub fn commit(&self) -> Result<Option<u64>, SearchError> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let opstamp = {
            let mut writer = self.writer()?;
            writer.commit()?
        };
        self.reader.reload()?;
        debug!(index = %self.name, opstamp, "Committed index changes");
        Ok(Some(opstamp))
    }

    /// Number of live documents
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

/// Open an existing index or create a new one for the given fields.
///
/// Uses MmapDirectory for persistence.
pub fn open_or_create_index(path: &Path, searchable_fields: &[&str]) -> Result<Index, SearchError> {
    if path.join("meta.json").exists() {
        debug!(path = ?path, "Opening existing index");
        Ok(Index::open_in_dir(path)?)
    } else {
        info!(path = ?path, "Creating new index");
        std::fs::create_dir_all(path)?;
        let schema = EntitySchema::build(searchable_fields)?;
        Ok(Index::create_in_dir(path, schema.schema().clone())?)
    }
}
