//! # blog-types
//!
//! Shared domain types for the blog search and task engine.
//!
//! This crate defines the data structures used throughout the workspace:
//! - Entities: `User`, `Post`, `Task` and `Notification` records
//! - Capabilities: [`Model`] for anything stored in a table, [`Indexable`]
//!   for entities that participate in full-text search
//! - Change capture: [`ChangeSet`] and [`IndexDocument`]
//! - Background jobs: [`JobMeta`] and [`TaskKind`]
//! - Pagination envelopes and layered [`Settings`]

pub mod change_set;
pub mod config;
pub mod entity;
pub mod error;
pub mod job;
pub mod notification;
pub mod pagination;
pub mod post;
pub mod task;
pub mod user;

pub use change_set::{ChangeSet, IndexDocument, SearchResult};
pub use config::Settings;
pub use entity::{Entity, EntityId, EntityKey, Indexable, Model};
pub use error::BlogError;
pub use job::{JobMeta, JobState, COMPLETE_PERCENT};
pub use notification::{Notification, NotificationPayload};
pub use pagination::{Page, PageLinks};
pub use post::Post;
pub use task::{Task, TaskKind};
pub use user::User;
