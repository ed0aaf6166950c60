//! Index synchronizer.
//!
//! Pushes added and updated entities to the text index as upserts and
//! deleted entities as deletes, keyed by entity id. The index is a
//! best-effort secondary view: with no index configured every operation
//! is a no-op, and backend failures while applying a change set are
//! logged and counted, never returned to the committing caller.

use std::sync::Arc;

use tracing::{debug, info, warn};

use blog_search::TextIndex;
use blog_types::{ChangeSet, Entity, EntityId, IndexDocument};

use crate::error::IndexingError;

/// Outcome of applying one change set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Documents written (added + updated)
    pub upserted: usize,
    /// Documents removed
    pub deleted: usize,
    /// Backend failures, including a failed commit
    pub errors: usize,
    /// Entities ignored because no index is configured
    pub skipped: usize,
}

impl SyncReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}

/// Mirrors entity changes into the text index.
pub struct IndexSynchronizer {
    index: Option<Arc<dyn TextIndex>>,
}

impl IndexSynchronizer {
    /// `None` means the index is unconfigured and sync is disabled.
    pub fn new(index: Option<Arc<dyn TextIndex>>) -> Self {
        match &index {
            Some(_) => info!("Index synchronizer enabled"),
            None => info!("No text index configured, index synchronization disabled"),
        }
        Self { index }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.index.is_some()
    }

    pub fn text_index(&self) -> Option<&Arc<dyn TextIndex>> {
        self.index.as_ref()
    }

    /// Write one document. Buffered until [`IndexSynchronizer::commit`].
    pub fn index_upsert(&self, index_name: &str, doc: &IndexDocument) -> Result<(), IndexingError> {
        if let Some(index) = &self.index {
            index.upsert(index_name, doc)?;
        }
        Ok(())
    }

    /// Remove one document. Buffered until [`IndexSynchronizer::commit`].
    pub fn index_delete(&self, index_name: &str, id: EntityId) -> Result<(), IndexingError> {
        if let Some(index) = &self.index {
            index.delete(index_name, id)?;
        }
        Ok(())
    }

    pub fn commit(&self) -> Result<(), IndexingError> {
        if let Some(index) = &self.index {
            index.commit()?;
        }
        Ok(())
    }

    fn upsert_entity(&self, entity: &Entity) -> Result<bool, IndexingError> {
        match entity.as_indexable() {
            Some(indexable) => {
                self.index_upsert(indexable.table_name(), &indexable.to_index_document())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_entity(&self, entity: &Entity) -> Result<bool, IndexingError> {
        match entity.as_indexable() {
            Some(indexable) => {
                self.index_delete(indexable.table_name(), indexable.entity_id())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply a change set and commit the index once.
    pub fn apply_change_set(&self, change_set: &ChangeSet) -> SyncReport {
        let mut report = SyncReport::new();

        if !self.is_enabled() {
            report.skipped = change_set.len();
            debug!(skipped = report.skipped, "Index disabled, change set dropped");
            return report;
        }
        if change_set.is_empty() {
            return report;
        }

        for entity in change_set.added.iter().chain(&change_set.updated) {
            match self.upsert_entity(entity) {
                Ok(true) => report.upserted += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(entity = %entity.key(), error = %e, "Failed to index entity");
                    report.errors += 1;
                }
            }
        }

        for entity in &change_set.deleted {
            match self.delete_entity(entity) {
                Ok(true) => report.deleted += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(entity = %entity.key(), error = %e, "Failed to remove entity from index");
                    report.errors += 1;
                }
            }
        }

        if let Err(e) = self.commit() {
            warn!(error = %e, "Failed to commit index changes");
            report.errors += 1;
        }

        debug!(
            upserted = report.upserted,
            deleted = report.deleted,
            errors = report.errors,
            "Applied change set"
        );
        report
    }
}
