//! Unit-of-work sessions.
//!
//! A session stages adds, updates and deletes and applies them in a single
//! `WriteBatch` on commit. Staging collapses repeated operations on the
//! same entity:
//! - update of a staged add stays an add
//! - delete of a staged add drops it
//! - add or update after a delete is rejected

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rocksdb::WriteBatch;
use tracing::{debug, info, warn};

use blog_types::{
    Entity, EntityId, EntityKey, Model, Notification, NotificationPayload, Post, Task, User,
};

use crate::column_families::CF_UNIQUE;
use crate::db::Storage;
use crate::error::StorageError;
use crate::keys::{RowKey, UniqueKey};
use crate::listener::{CommitListener, PendingChanges, TransactionContext};

#[derive(Debug, Clone)]
enum Staged {
    New(Entity),
    Dirty(Entity),
    Deleted(Entity),
}

/// Counts of rows written by a commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// A unit of work against the primary store.
///
/// Dropping a session without committing discards its staged work.
pub struct Session<'a> {
    storage: &'a Storage,
    staged: BTreeMap<EntityKey, Staged>,
    context: TransactionContext,
}

impl<'a> Session<'a> {
    pub(crate) fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            staged: BTreeMap::new(),
            context: TransactionContext::default(),
        }
    }

    /// Stage a new row. Assigns an id when the entity has none.
    pub fn add<T: Model>(&mut self, model: T) -> Result<EntityId, StorageError> {
        self.add_entity(model.into_entity())
    }

    /// Stage new values for an existing row.
    pub fn update<T: Model>(&mut self, model: T) -> Result<(), StorageError> {
        self.update_entity(model.into_entity())
    }

    /// Stage removal of a row.
    pub fn delete<T: Model>(&mut self, model: T) -> Result<(), StorageError> {
        self.delete_entity(model.into_entity())
    }

    pub fn add_entity(&mut self, mut entity: Entity) -> Result<EntityId, StorageError> {
        let table = entity.table_name();
        if entity.id() == 0 {
            entity.set_id(self.storage.next_id(table)?);
        } else {
            self.storage.observe_id(table, entity.id())?;
        }

        let key = entity.key();
        match self.staged.get(&key) {
            Some(Staged::Deleted(_)) => Err(StorageError::InvalidState(format!(
                "{} was deleted in this session",
                key
            ))),
            Some(_) => Err(StorageError::InvalidState(format!(
                "{} is already staged",
                key
            ))),
            None => {
                debug!(entity = %key, "Staged add");
                self.staged.insert(key, Staged::New(entity));
                Ok(key.id)
            }
        }
    }

    pub fn update_entity(&mut self, entity: Entity) -> Result<(), StorageError> {
        let key = entity.key();
        if key.id == 0 {
            return Err(StorageError::InvalidState(format!(
                "cannot update {} row without an id",
                key.table
            )));
        }

        let staged = match self.staged.remove(&key) {
            Some(Staged::New(_)) => Staged::New(entity),
            Some(Staged::Deleted(previous)) => {
                self.staged.insert(key, Staged::Deleted(previous));
                return Err(StorageError::InvalidState(format!(
                    "{} was deleted in this session",
                    key
                )));
            }
            Some(Staged::Dirty(_)) | None => Staged::Dirty(entity),
        };
        debug!(entity = %key, "Staged update");
        self.staged.insert(key, staged);
        Ok(())
    }

    pub fn delete_entity(&mut self, entity: Entity) -> Result<(), StorageError> {
        let key = entity.key();
        match self.staged.remove(&key) {
            Some(Staged::New(_)) => {
                debug!(entity = %key, "Dropped staged add");
            }
            Some(Staged::Deleted(previous)) => {
                self.staged.insert(key, Staged::Deleted(previous));
            }
            Some(Staged::Dirty(_)) | None => {
                debug!(entity = %key, "Staged delete");
                self.staged.insert(key, Staged::Deleted(entity));
            }
        }
        Ok(())
    }

    /// Stage a notification, replacing the user's existing notifications
    /// of the same kind.
    pub fn add_notification(
        &mut self,
        user_id: EntityId,
        payload: NotificationPayload,
    ) -> Result<EntityId, StorageError> {
        let name = payload.name();

        let staged_same_kind: Vec<Entity> = self
            .staged
            .values()
            .filter_map(|s| match s {
                Staged::New(e @ Entity::Notification(n)) | Staged::Dirty(e @ Entity::Notification(n))
                    if n.user_id == user_id && n.name() == name =>
                {
                    Some(e.clone())
                }
                _ => None,
            })
            .collect();
        for entity in staged_same_kind {
            self.delete_entity(entity)?;
        }

        for existing in self.storage.notifications_for_user(user_id)? {
            let key = EntityKey {
                table: Notification::TABLE,
                id: existing.id,
            };
            if existing.name() == name && !self.staged.contains_key(&key) {
                self.delete(existing)?;
            }
        }

        self.add(Notification::new(user_id, payload))
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Number of staged entities
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    /// Snapshot of the staged changes
    pub fn pending_changes(&self) -> PendingChanges {
        let mut pending = PendingChanges::default();
        for staged in self.staged.values() {
            match staged {
                Staged::New(e) => pending.new.push(e.clone()),
                Staged::Dirty(e) => pending.dirty.push(e.clone()),
                Staged::Deleted(e) => pending.deleted.push(e.clone()),
            }
        }
        pending
    }

    /// Discard staged work. No listener is notified.
    pub fn rollback(self) {
        debug!(staged = self.staged.len(), "Session rolled back");
    }

    /// Apply staged work atomically.
    ///
    /// Runs every listener's `before_commit`, checks constraints, then
    /// writes one batch. `after_commit` runs only when the batch is written;
    /// on any failure the transaction context is discarded.
    ///
    /// The commit lock is held from the batch write until every
    /// `after_commit` has returned, so listeners observe commits in the
    /// order the store applied them.
    pub fn commit(mut self) -> Result<CommitSummary, StorageError> {
        let pending = self.pending_changes();
        let listeners = self.storage.listeners_snapshot()?;

        match self.commit_inner(&pending, &listeners) {
            Ok(summary) => {
                self.context.clear();
                info!(
                    added = summary.added,
                    updated = summary.updated,
                    deleted = summary.deleted,
                    "Committed session"
                );
                Ok(summary)
            }
            Err(e) => {
                self.context.clear();
                warn!(error = %e, "Commit failed, transaction rolled back");
                Err(e)
            }
        }
    }

    fn commit_inner(
        &mut self,
        pending: &PendingChanges,
        listeners: &[Arc<dyn CommitListener>],
    ) -> Result<CommitSummary, StorageError> {
        for listener in listeners {
            listener.before_commit(pending, &mut self.context)?;
        }

        let _guard = self.storage.lock_commits()?;
        let batch = BatchPlan::new(self.storage).build(pending)?;
        self.storage.db.write(batch)?;

        for listener in listeners {
            listener.after_commit(&mut self.context);
        }

        Ok(CommitSummary {
            added: pending.new.len(),
            updated: pending.dirty.len(),
            deleted: pending.deleted.len(),
        })
    }
}

/// Constraint checks and batch assembly for one commit.
///
/// Tracks the effect of the batch so far, so later checks see earlier
/// changes of the same transaction.
struct BatchPlan<'s> {
    storage: &'s Storage,
    batch: WriteBatch,
    rows: HashMap<EntityKey, bool>,
    unique: HashMap<UniqueKey, Option<EntityId>>,
}

impl<'s> BatchPlan<'s> {
    fn new(storage: &'s Storage) -> Self {
        Self {
            storage,
            batch: WriteBatch::default(),
            rows: HashMap::new(),
            unique: HashMap::new(),
        }
    }

    fn row_exists(&self, key: &EntityKey) -> Result<bool, StorageError> {
        match self.rows.get(key) {
            Some(exists) => Ok(*exists),
            None => self.storage.row_exists(key.table, key.id),
        }
    }

    fn unique_owner(&self, key: &UniqueKey) -> Result<Option<EntityId>, StorageError> {
        match self.unique.get(key) {
            Some(owner) => Ok(*owner),
            None => self.storage.unique_owner(key),
        }
    }

    fn claim(&mut self, key: UniqueKey, id: EntityId) -> Result<(), StorageError> {
        match self.unique_owner(&key)? {
            Some(owner) if owner != id => Err(StorageError::Constraint(format!(
                "duplicate value for {}",
                key
            ))),
            _ => {
                let cf = self.storage.cf(CF_UNIQUE)?;
                self.batch
                    .put_cf(cf, key.to_bytes(), RowKey::new(id).to_bytes());
                self.unique.insert(key, Some(id));
                Ok(())
            }
        }
    }

    fn release(&mut self, key: UniqueKey) -> Result<(), StorageError> {
        let cf = self.storage.cf(CF_UNIQUE)?;
        self.batch.delete_cf(cf, key.to_bytes());
        self.unique.insert(key, None);
        Ok(())
    }

    fn existing(&self, entity: &Entity, action: &str) -> Result<Entity, StorageError> {
        self.storage
            .get_entity(entity.table_name(), entity.id())?
            .ok_or_else(|| {
                StorageError::Constraint(format!("cannot {} missing row {}", action, entity.key()))
            })
    }

    fn put_row(&mut self, entity: &Entity) -> Result<(), StorageError> {
        let cf = self.storage.cf(entity.table_name())?;
        self.batch
            .put_cf(cf, RowKey::new(entity.id()).to_bytes(), entity.to_row_bytes()?);
        self.rows.insert(entity.key(), true);
        Ok(())
    }

    /// Deletes first, so values they free can be reused by the same
    /// transaction, then updates, then inserts, then foreign keys.
    fn build(mut self, pending: &PendingChanges) -> Result<WriteBatch, StorageError> {
        for entity in &pending.deleted {
            let existing = self.existing(entity, "delete")?;
            for key in UniqueKey::for_entity(&existing) {
                self.release(key)?;
            }
            let cf = self.storage.cf(entity.table_name())?;
            self.batch.delete_cf(cf, RowKey::new(entity.id()).to_bytes());
            self.rows.insert(entity.key(), false);
        }

        for entity in &pending.dirty {
            let existing = self.existing(entity, "update")?;
            let old_keys = UniqueKey::for_entity(&existing);
            let new_keys = UniqueKey::for_entity(entity);
            for key in old_keys.iter().filter(|k| !new_keys.contains(k)) {
                self.release(key.clone())?;
            }
            for key in new_keys.into_iter().filter(|k| !old_keys.contains(k)) {
                self.claim(key, entity.id())?;
            }
            self.put_row(entity)?;
        }

        for entity in &pending.new {
            if self.row_exists(&entity.key())? {
                return Err(StorageError::Constraint(format!(
                    "duplicate primary key {}",
                    entity.key()
                )));
            }
            for key in UniqueKey::for_entity(entity) {
                self.claim(key, entity.id())?;
            }
            self.put_row(entity)?;
        }

        for entity in pending.new.iter().chain(&pending.dirty) {
            if let Some(user_id) = owning_user(entity) {
                let parent = EntityKey {
                    table: User::TABLE,
                    id: user_id,
                };
                if !self.row_exists(&parent)? {
                    return Err(StorageError::Constraint(format!(
                        "{} references missing {}",
                        entity.key(),
                        parent
                    )));
                }
            }
        }

        for entity in &pending.deleted {
            if let Entity::User(user) = entity {
                self.check_no_dependents(user.id)?;
            }
        }

        Ok(self.batch)
    }

    /// Rows still referencing a user about to be deleted
    fn check_no_dependents(&self, user_id: EntityId) -> Result<(), StorageError> {
        let mut dependents: Vec<EntityKey> = Vec::new();
        dependents.extend(
            self.storage
                .posts_by_user(user_id)?
                .into_iter()
                .map(|p| p.into_entity().key()),
        );
        dependents.extend(
            self.storage
                .tasks_for_user(user_id)?
                .into_iter()
                .map(|t| t.into_entity().key()),
        );
        dependents.extend(
            self.storage
                .notifications_for_user(user_id)?
                .into_iter()
                .map(|n| n.into_entity().key()),
        );

        for key in dependents {
            if self.row_exists(&key)? {
                return Err(StorageError::Constraint(format!(
                    "user:{} is still referenced by {}",
                    user_id, key
                )));
            }
        }
        Ok(())
    }
}

fn owning_user(entity: &Entity) -> Option<EntityId> {
    match entity {
        Entity::Post(Post { user_id, .. })
        | Entity::Task(Task { user_id, .. })
        | Entity::Notification(Notification { user_id, .. }) => Some(*user_id),
        Entity::User(_) => None,
    }
}
