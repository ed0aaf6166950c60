//! Key encoding and decoding for storage layer.
//!
//! Row key format: `{id:020}` inside the table's column family, so that
//! lexicographic order equals primary-key order.
//!
//! Unique key format: `{table}.{field}:{value}` inside the `unique` column
//! family; the value is the owning row's key.

use blog_types::{Entity, EntityId};

use crate::error::StorageError;

/// Key for a table row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowKey {
    pub id: EntityId,
}

impl RowKey {
    pub fn new(id: EntityId) -> Self {
        Self { id }
    }

    /// Encode key to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{:020}", self.id).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;
        let id: EntityId = s
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid row id {:?}: {}", s, e)))?;
        Ok(Self { id })
    }
}

/// Key for a unique field value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueKey {
    pub table: &'static str,
    pub field: &'static str,
    pub value: String,
}

impl UniqueKey {
    pub fn new(table: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self {
            table,
            field,
            value: value.into(),
        }
    }

    /// Encode key to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}.{}:{}", self.table, self.field, self.value).into_bytes()
    }

    /// Unique keys an entity claims while it exists.
    pub fn for_entity(entity: &Entity) -> Vec<UniqueKey> {
        match entity {
            Entity::User(user) => vec![
                UniqueKey::new("user", "username", user.username.as_str()),
                UniqueKey::new("user", "email", user.email.as_str()),
            ],
            Entity::Task(task) => vec![UniqueKey::new("task", "job_id", task.job_id.as_str())],
            Entity::Post(_) | Entity::Notification(_) => Vec::new(),
        }
    }
}

impl std::fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}={:?}", self.table, self.field, self.value)
    }
}
