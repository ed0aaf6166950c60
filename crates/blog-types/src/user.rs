//! User accounts.
//!
//! Only the profile fields the engine needs are modelled; credentials are
//! owned by the identity collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, Model};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: EntityId,

    /// Unique login name
    pub username: String,

    /// Unique email address
    pub email: String,

    #[serde(default)]
    pub about_me: Option<String>,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: 0,
            username: username.into(),
            email: email.into(),
            about_me: None,
            last_seen: None,
        }
    }
}

impl Model for User {
    const TABLE: &'static str = "user";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn into_entity(self) -> Entity {
        Entity::User(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::User(user) => Some(user),
            _ => None,
        }
    }
}
