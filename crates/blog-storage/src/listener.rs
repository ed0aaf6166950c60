//! Commit listeners.
//!
//! Listeners observe every session commit. `before_commit` runs with the
//! staged changes before constraints are checked and may stash state in the
//! transaction-local [`TransactionContext`]. `after_commit` runs only once
//! the write batch is durable, still inside the commit lock; on failure it
//! never runs and the context is discarded.

use blog_types::{ChangeSet, Entity};

use crate::error::StorageError;

/// Registration handle returned by `Storage::register_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub(crate) u64);

impl ListenerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Staged changes of one session, as seen at commit time.
///
/// Ids are already assigned. The three collections are disjoint.
#[derive(Debug, Clone, Default)]
pub struct PendingChanges {
    pub new: Vec<Entity>,
    pub dirty: Vec<Entity>,
    pub deleted: Vec<Entity>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.dirty.is_empty() && self.deleted.is_empty()
    }
}

/// Per-transaction state shared between the commit hooks.
///
/// Each session owns its own context; nothing here outlives one commit.
#[derive(Debug, Default)]
pub struct TransactionContext {
    change_set: Option<ChangeSet>,
}

impl TransactionContext {
    pub fn stash_change_set(&mut self, change_set: ChangeSet) {
        self.change_set = Some(change_set);
    }

    pub fn take_change_set(&mut self) -> Option<ChangeSet> {
        self.change_set.take()
    }

    pub fn change_set(&self) -> Option<&ChangeSet> {
        self.change_set.as_ref()
    }

    pub(crate) fn clear(&mut self) {
        self.change_set = None;
    }
}

/// Hook pair invoked around every commit.
pub trait CommitListener: Send + Sync {
    /// Listener name for logging
    fn name(&self) -> &str;

    /// Called before constraint checks. An error aborts the commit.
    fn before_commit(
        &self,
        pending: &PendingChanges,
        tx: &mut TransactionContext,
    ) -> Result<(), StorageError>;

    /// Called after the commit is durable. Cannot fail the commit.
    ///
    /// Runs under the store's commit lock, so commits reach listeners in
    /// store order. Must not commit a session on the same store.
    fn after_commit(&self, tx: &mut TransactionContext);
}
