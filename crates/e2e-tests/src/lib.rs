//! End-to-end test infrastructure for the blog engine.
//!
//! Provides a shared TestHarness wiring the primary store, the text index
//! and the search sync listener the same way the binary does, plus helpers
//! for seeding users and posts.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use blog_indexing::{IndexSynchronizer, SearchQueryEngine, SearchSyncListener};
use blog_search::{SearchIndexConfig, SearchError, TantivyTextIndex, TextIndex};
use blog_storage::{ListenerHandle, Storage};
use blog_types::{EntityId, IndexDocument, Post, SearchResult, User};

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub storage: Arc<Storage>,
    pub synchronizer: Arc<IndexSynchronizer>,
    pub listener: Arc<SearchSyncListener>,
    pub listener_handle: ListenerHandle,
    pub engine: SearchQueryEngine,
    /// Root directory of the Tantivy indexes
    pub index_path: PathBuf,
    /// Directory export jobs write into
    pub export_dir: PathBuf,
}

impl TestHarness {
    /// Harness backed by a Tantivy index in a temp directory.
    pub fn new() -> Self {
        Self::build(|index_path| {
            let index = TantivyTextIndex::open(SearchIndexConfig::new(index_path))
                .expect("Failed to open text index");
            Some(Arc::new(index) as Arc<dyn TextIndex>)
        })
    }

    /// Harness with no text index configured.
    pub fn without_search() -> Self {
        Self::build(|_| None)
    }

    /// Harness backed by a caller-supplied text index.
    pub fn with_text_index(index: Arc<dyn TextIndex>) -> Self {
        Self::build(move |_| Some(index))
    }

    fn build(make_index: impl FnOnce(PathBuf) -> Option<Arc<dyn TextIndex>>) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage = Arc::new(
            Storage::open(&temp_dir.path().join("db")).expect("Failed to open test storage"),
        );
        let index_path = temp_dir.path().join("search-index");
        let export_dir = temp_dir.path().join("exports");

        let synchronizer = Arc::new(IndexSynchronizer::new(make_index(index_path.clone())));
        let listener = Arc::new(SearchSyncListener::new(synchronizer.clone()));
        let listener_handle = storage
            .register_listener(listener.clone())
            .expect("Failed to register listener");
        let engine = SearchQueryEngine::new(storage.clone(), synchronizer.clone());

        Self {
            _temp_dir: temp_dir,
            storage,
            synchronizer,
            listener,
            listener_handle,
            engine,
            index_path,
            export_dir,
        }
    }

    /// Insert and commit a user.
    pub fn create_user(&self, username: &str) -> User {
        let mut user = User::new(username, format!("{}@example.com", username));
        let mut session = self.storage.session();
        user.id = session.add(user.clone()).expect("Failed to stage user");
        session.commit().expect("Failed to commit user");
        user
    }

    /// Insert and commit one post per body, oldest first.
    pub fn create_posts(&self, user_id: EntityId, bodies: &[&str]) -> Vec<Post> {
        let mut session = self.storage.session();
        let posts: Vec<Post> = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                let mut post = Post::new(user_id, *body, post_timestamp(i));
                post.id = session.add(post.clone()).expect("Failed to stage post");
                post
            })
            .collect();
        session.commit().expect("Failed to commit posts");
        posts
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic post timestamps, one minute apart.
pub fn post_timestamp(index: usize) -> DateTime<Utc> {
    let base = Utc
        .with_ymd_and_hms(2024, 1, 29, 9, 0, 0)
        .single()
        .expect("valid base timestamp");
    base + Duration::minutes(index as i64)
}

/// A write issued against a [`ScriptedIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCall {
    Upsert(String, EntityId),
    Delete(String, EntityId),
    Commit,
}

/// Text index that records writes and answers every query with a fixed
/// ranked result.
#[derive(Default)]
pub struct ScriptedIndex {
    pub calls: Mutex<Vec<IndexCall>>,
    pub ranked: Mutex<SearchResult>,
}

impl ScriptedIndex {
    pub fn returning(ids: Vec<EntityId>, total: u64) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            ranked: Mutex::new(SearchResult { ids, total }),
        }
    }

    pub fn calls(&self) -> Vec<IndexCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl TextIndex for ScriptedIndex {
    fn upsert(&self, index: &str, doc: &IndexDocument) -> Result<(), SearchError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(IndexCall::Upsert(index.to_string(), doc.id));
        Ok(())
    }

    fn delete(&self, index: &str, id: EntityId) -> Result<(), SearchError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(IndexCall::Delete(index.to_string(), id));
        Ok(())
    }

    fn query(
        &self,
        _index: &str,
        _text: &str,
        offset: usize,
        limit: usize,
    ) -> Result<SearchResult, SearchError> {
        let ranked = self.ranked.lock().expect("ranked lock").clone();
        Ok(SearchResult {
            ids: ranked.ids.into_iter().skip(offset).take(limit).collect(),
            total: ranked.total,
        })
    }

    fn commit(&self) -> Result<(), SearchError> {
        self.calls.lock().expect("calls lock").push(IndexCall::Commit);
        Ok(())
    }
}
