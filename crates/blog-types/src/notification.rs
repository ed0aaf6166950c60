//! User notifications with typed payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, Model};

/// Notification payload, one variant per notification kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum NotificationPayload {
    /// Progress of a background task
    TaskProgress { task_id: String, progress: u8 },
    /// Number of unread private messages
    UnreadMessageCount { count: u64 },
}

impl NotificationPayload {
    /// Kind name. A user holds at most one notification per kind.
    pub fn name(&self) -> &'static str {
        match self {
            NotificationPayload::TaskProgress { .. } => "task_progress",
            NotificationPayload::UnreadMessageCount { .. } => "unread_message_count",
        }
    }
}

/// A notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub id: EntityId,

    pub user_id: EntityId,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    pub payload: NotificationPayload,
}

impl Notification {
    pub fn new(user_id: EntityId, payload: NotificationPayload) -> Self {
        Self {
            id: 0,
            user_id,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn name(&self) -> &'static str {
        self.payload.name()
    }
}

impl Model for Notification {
    const TABLE: &'static str = "notification";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn into_entity(self) -> Entity {
        Entity::Notification(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Notification(n) => Some(n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_json_is_tagged() {
        let payload = NotificationPayload::TaskProgress {
            task_id: "abc".to_string(),
            progress: 40,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"name":"task_progress","task_id":"abc","progress":40}"#);
    }

    #[test]
    fn test_payload_names() {
        let unread = NotificationPayload::UnreadMessageCount { count: 2 };
        assert_eq!(unread.name(), "unread_message_count");
        assert_eq!(Notification::new(1, unread).name(), "unread_message_count");
    }
}
