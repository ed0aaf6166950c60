//! Change capture at the commit boundary.
//!
//! Before a commit the listener snapshots the indexable part of the
//! session's pending changes into the transaction context. After a
//! successful commit it hands that snapshot to the synchronizer. A failed
//! commit never reaches `after_commit`, so its snapshot is discarded
//! without touching the index.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use blog_storage::{CommitListener, PendingChanges, StorageError, TransactionContext};
use blog_types::ChangeSet;

use crate::synchronizer::IndexSynchronizer;

/// Commit listener that keeps the text index in sync.
pub struct SearchSyncListener {
    synchronizer: Arc<IndexSynchronizer>,
    applied: AtomicU64,
}

impl SearchSyncListener {
    pub fn new(synchronizer: Arc<IndexSynchronizer>) -> Self {
        Self {
            synchronizer,
            applied: AtomicU64::new(0),
        }
    }

    pub fn synchronizer(&self) -> &Arc<IndexSynchronizer> {
        &self.synchronizer
    }

    /// Number of change sets handed to the synchronizer so far
    pub fn applied_count(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }
}

impl CommitListener for SearchSyncListener {
    fn name(&self) -> &str {
        "search-sync"
    }

    fn before_commit(
        &self,
        pending: &PendingChanges,
        tx: &mut TransactionContext,
    ) -> Result<(), StorageError> {
        let change_set = ChangeSet::capture(&pending.new, &pending.dirty, &pending.deleted);
        debug!(
            added = change_set.added.len(),
            updated = change_set.updated.len(),
            deleted = change_set.deleted.len(),
            "Captured change set"
        );
        tx.stash_change_set(change_set);
        Ok(())
    }

    fn after_commit(&self, tx: &mut TransactionContext) {
        let Some(change_set) = tx.take_change_set() else {
            return;
        };
        if change_set.is_empty() {
            return;
        }
        self.synchronizer.apply_change_set(&change_set);
        self.applied.fetch_add(1, Ordering::SeqCst);
    }
}
