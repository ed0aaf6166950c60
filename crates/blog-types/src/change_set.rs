//! Change capture and index projection types.
//!
//! A [`ChangeSet`] is the snapshot of indexable entities touched by one
//! commit. It is built before the commit, applied after it, and never
//! persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};

/// Indexable entities added, updated and deleted by one commit.
///
/// The three sequences are disjoint: an entity added and later updated
/// in the same transaction is only listed as added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub added: Vec<Entity>,
    pub updated: Vec<Entity>,
    pub deleted: Vec<Entity>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a change set from pending session collections, keeping only
    /// entities whose type is indexable.
    pub fn capture<'a>(
        pending_new: impl IntoIterator<Item = &'a Entity>,
        pending_dirty: impl IntoIterator<Item = &'a Entity>,
        pending_deleted: impl IntoIterator<Item = &'a Entity>,
    ) -> Self {
        fn indexable<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> Vec<Entity> {
            entities
                .into_iter()
                .filter(|e| e.as_indexable().is_some())
                .cloned()
                .collect()
        }

        Self {
            added: indexable(pending_new),
            updated: indexable(pending_dirty),
            deleted: indexable(pending_deleted),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of entity references.
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.deleted.len()
    }
}

/// Searchable-fields-only projection of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: EntityId,
    pub fields: BTreeMap<String, String>,
}

impl IndexDocument {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Field names, sorted.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Ranked ids for one page of a query, plus the index's total match count.
///
/// `total` counts all matches, so it may exceed the number of entities a
/// page eventually resolves to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub ids: Vec<EntityId>,
    pub total: u64,
}

impl SearchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
