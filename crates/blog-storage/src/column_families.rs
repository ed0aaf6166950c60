//! Column family definitions for RocksDB.
//!
//! Each table gets its own column family, named after the table:
//! - user, post, task, notification: rows keyed by zero-padded id
//! - unique: secondary index for unique fields (username, email, job_id)

use blog_types::{Model, Notification, Post, Task, User};
use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family for users
pub const CF_USER: &str = User::TABLE;

/// Column family for posts
pub const CF_POST: &str = Post::TABLE;

/// Column family for persisted task records
pub const CF_TASK: &str = Task::TABLE;

/// Column family for notifications
pub const CF_NOTIFICATION: &str = Notification::TABLE;

/// Column family for unique field lookups
pub const CF_UNIQUE: &str = "unique";

/// Column families that hold entity rows
pub const TABLE_CF_NAMES: &[&str] = &[CF_USER, CF_POST, CF_TASK, CF_NOTIFICATION];

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_USER, CF_POST, CF_TASK, CF_NOTIFICATION, CF_UNIQUE];

/// Posts are write-once-read-many; compress them
fn post_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_USER, Options::default()),
        ColumnFamilyDescriptor::new(CF_POST, post_options()),
        ColumnFamilyDescriptor::new(CF_TASK, Options::default()),
        ColumnFamilyDescriptor::new(CF_NOTIFICATION, Options::default()),
        ColumnFamilyDescriptor::new(CF_UNIQUE, Options::default()),
    ]
}
