//! The `export_posts` job.
//!
//! Produces `{"posts": [{"body": ..., "timestamp": ...}]}` with the user's
//! posts oldest first and ISO-8601 UTC timestamps. Progress is reported
//! after every post and always ends at 100, also when the export fails.

use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use serde::Serialize;
use tracing::{debug, info, warn};

use blog_storage::Storage;
use blog_types::{EntityId, User};

use crate::error::TaskError;
use crate::tracker::ProgressTracker;

/// Destination of finished exports.
pub trait ExportSink: Send + Sync {
    fn deliver(&self, user: &User, json: &str) -> Result<(), TaskError>;
}

/// Writes exports to `<dir>/<username>-posts.json`.
#[derive(Debug, Clone)]
pub struct FileExportSink {
    dir: PathBuf,
}

impl FileExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{}-posts.json", username))
    }
}

impl ExportSink for FileExportSink {
    fn deliver(&self, user: &User, json: &str) -> Result<(), TaskError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&user.username);
        std::fs::write(&path, json)?;
        info!(user = %user.username, path = %path.display(), "Export written");
        Ok(())
    }
}

#[derive(Serialize)]
struct ExportedPost<'a> {
    body: &'a str,
    timestamp: String,
}

#[derive(Serialize)]
struct ExportFile<'a> {
    posts: Vec<ExportedPost<'a>>,
}

/// Run the export for `user_id` under job `job_id`.
///
/// Failures are logged and returned after progress has been set to 100.
pub fn export_posts(
    storage: &Storage,
    tracker: &ProgressTracker,
    sink: &dyn ExportSink,
    job_id: &str,
    user_id: EntityId,
) -> Result<(), TaskError> {
    let result = run_export(storage, tracker, sink, job_id, user_id);
    if let Err(e) = &result {
        warn!(job_id, user_id, error = %e, "Post export failed");
    }
    tracker.set_progress(job_id, 100)?;
    result
}

fn run_export(
    storage: &Storage,
    tracker: &ProgressTracker,
    sink: &dyn ExportSink,
    job_id: &str,
    user_id: EntityId,
) -> Result<(), TaskError> {
    let user = storage
        .get::<User>(user_id)?
        .ok_or_else(|| TaskError::NotFound(format!("user {}", user_id)))?;

    tracker.set_progress(job_id, 0)?;

    let posts = storage.posts_by_user(user_id)?;
    let total = posts.len();
    let mut exported = Vec::with_capacity(total);
    for (i, post) in posts.iter().enumerate() {
        exported.push(ExportedPost {
            body: &post.body,
            timestamp: post.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        let done = i + 1;
        tracker.set_progress(job_id, (100 * done / total) as i64)?;
    }
    debug!(job_id, user_id, total, "Posts serialized");

    let json = serde_json::to_string_pretty(&ExportFile { posts: exported })?;
    sink.deliver(&user, &json)
}
