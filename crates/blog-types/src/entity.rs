//! Entity capabilities and the tagged entity variant.
//!
//! Every persisted record implements [`Model`]. Records that take part in
//! full-text search additionally implement [`Indexable`], which the change
//! capture layer checks through [`Entity::as_indexable`].

use serde::{Deserialize, Serialize};

use crate::change_set::IndexDocument;
use crate::error::BlogError;
use crate::notification::Notification;
use crate::post::Post;
use crate::task::Task;
use crate::user::User;

/// Integer identifier assigned by the primary store.
pub type EntityId = u64;

/// A record type stored in its own table of the primary store.
pub trait Model: Clone + Sized {
    /// Table name. Indexable models also use it as their index name.
    const TABLE: &'static str;

    /// Identifier, 0 until the store assigns one.
    fn id(&self) -> EntityId;

    /// Set the identifier (used by the store on insert).
    fn set_id(&mut self, id: EntityId);

    /// Wrap into the tagged entity variant.
    fn into_entity(self) -> Entity;

    /// Unwrap from the tagged entity variant, `None` for other tables.
    fn from_entity(entity: Entity) -> Option<Self>;
}

/// Capability of entities that are mirrored into the text index.
pub trait Indexable {
    /// Index name, derived from the entity's table.
    fn table_name(&self) -> &'static str;

    /// Names of the fields copied into the index.
    fn searchable_fields(&self) -> &'static [&'static str];

    /// Identifier the index document is keyed by.
    fn entity_id(&self) -> EntityId;

    /// Current value of a searchable field.
    fn field_value(&self, field: &str) -> Option<String>;

    /// Project the searchable fields into an index document.
    ///
    /// Every declared field is present; missing values become empty strings.
    fn to_index_document(&self) -> IndexDocument {
        let mut doc = IndexDocument::new(self.entity_id());
        for field in self.searchable_fields() {
            doc.insert(*field, self.field_value(field).unwrap_or_default());
        }
        doc
    }
}

/// Table-qualified entity identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub table: &'static str,
    pub id: EntityId,
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table, self.id)
    }
}

/// Any record held by the primary store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum Entity {
    User(User),
    Post(Post),
    Task(Task),
    Notification(Notification),
}

impl Entity {
    /// Table this entity lives in.
    pub fn table_name(&self) -> &'static str {
        match self {
            Entity::User(_) => User::TABLE,
            Entity::Post(_) => Post::TABLE,
            Entity::Task(_) => Task::TABLE,
            Entity::Notification(_) => Notification::TABLE,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            Entity::User(u) => u.id,
            Entity::Post(p) => p.id,
            Entity::Task(t) => t.id,
            Entity::Notification(n) => n.id,
        }
    }

    pub fn set_id(&mut self, id: EntityId) {
        match self {
            Entity::User(u) => u.id = id,
            Entity::Post(p) => p.id = id,
            Entity::Task(t) => t.id = id,
            Entity::Notification(n) => n.id = id,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey {
            table: self.table_name(),
            id: self.id(),
        }
    }

    /// The searchable view of this entity, if its type is indexable.
    pub fn as_indexable(&self) -> Option<&dyn Indexable> {
        match self {
            Entity::Post(post) => Some(post),
            Entity::User(_) | Entity::Task(_) | Entity::Notification(_) => None,
        }
    }

    /// Serialize the inner record (without the table tag) for storage.
    pub fn to_row_bytes(&self) -> Result<Vec<u8>, BlogError> {
        let bytes = match self {
            Entity::User(u) => serde_json::to_vec(u)?,
            Entity::Post(p) => serde_json::to_vec(p)?,
            Entity::Task(t) => serde_json::to_vec(t)?,
            Entity::Notification(n) => serde_json::to_vec(n)?,
        };
        Ok(bytes)
    }

    /// Decode a stored row of the given table.
    pub fn from_row_bytes(table: &str, bytes: &[u8]) -> Result<Self, BlogError> {
        let entity = match table {
            User::TABLE => Entity::User(serde_json::from_slice(bytes)?),
            Post::TABLE => Entity::Post(serde_json::from_slice(bytes)?),
            Task::TABLE => Entity::Task(serde_json::from_slice(bytes)?),
            Notification::TABLE => Entity::Notification(serde_json::from_slice(bytes)?),
            other => return Err(BlogError::UnknownTable(other.to_string())),
        };
        Ok(entity)
    }
}
