//! Primary store for the blog engine.
//!
//! Provides RocksDB-backed storage with:
//! - One column family per table, keyed by zero-padded id
//! - Per-table monotonic id sequences
//! - Unit-of-work sessions with staged add/update/delete
//! - Constraint checks (unique fields, foreign keys) before each commit
//! - Atomic commits via WriteBatch
//! - Commit listeners with before/after commit hooks

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod listener;
pub mod session;

pub use db::{Storage, StorageStats};
pub use error::StorageError;
pub use keys::{RowKey, UniqueKey};
pub use listener::{CommitListener, ListenerHandle, PendingChanges, TransactionContext};
pub use session::{CommitSummary, Session};
