//! Blog post records.
//!
//! Posts are the only searchable entity: their `body` is mirrored into the
//! `post` text index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, Indexable, Model};

/// Fields of a post copied into the text index.
pub const POST_SEARCHABLE_FIELDS: &[&str] = &["body"];

/// A post written by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Store-assigned identifier (0 until inserted)
    #[serde(default)]
    pub id: EntityId,

    /// Post text
    pub body: String,

    /// When the post was written
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Author
    pub user_id: EntityId,

    /// Detected language code, if any
    #[serde(default)]
    pub language: Option<String>,
}

impl Post {
    /// Create a new, not yet inserted post.
    pub fn new(user_id: EntityId, body: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            body: body.into(),
            timestamp,
            user_id,
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Use an explicit identifier instead of a store-assigned one.
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }
}

impl Model for Post {
    const TABLE: &'static str = "post";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn into_entity(self) -> Entity {
        Entity::Post(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Post(post) => Some(post),
            _ => None,
        }
    }
}

impl Indexable for Post {
    fn table_name(&self) -> &'static str {
        Self::TABLE
    }

    fn searchable_fields(&self) -> &'static [&'static str] {
        POST_SEARCHABLE_FIELDS
    }

    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "body" => Some(self.body.clone()),
            _ => None,
        }
    }
}
