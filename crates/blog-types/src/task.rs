//! Persisted background task records.
//!
//! A `Task` is the relational-side record of a queued job. The job id is
//! issued by the queue and is unique across tasks.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, Model};

/// Kinds of background work that can be launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Export all of a user's posts as JSON
    ExportPosts,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ExportPosts => "export_posts",
        }
    }

    /// Parse from string, returning None for unknown kinds.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "export_posts" => Some(TaskKind::ExportPosts),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown task kind: {}", s))
    }
}

/// Relational record of a launched job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: EntityId,

    /// Queue-issued job id
    pub job_id: String,

    pub name: TaskKind,

    pub description: String,

    /// Owner of the task
    pub user_id: EntityId,

    /// Set once progress reaches 100
    #[serde(default)]
    pub complete: bool,
}

impl Task {
    pub fn new(
        job_id: impl Into<String>,
        name: TaskKind,
        description: impl Into<String>,
        user_id: EntityId,
    ) -> Self {
        Self {
            id: 0,
            job_id: job_id.into(),
            name,
            description: description.into(),
            user_id,
            complete: false,
        }
    }
}

impl Model for Task {
    const TABLE: &'static str = "task";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn into_entity(self) -> Entity {
        Entity::Task(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Task(task) => Some(task),
            _ => None,
        }
    }
}
