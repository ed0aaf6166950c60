//! Search query engine.
//!
//! Runs a free-text query for one page and resolves the ranked ids back to
//! stored entities. The store returns rows in primary-key order, so rows are
//! re-sorted by their position in the index's ranking. Ids the store no
//! longer has are dropped; `total` still reports the index's count.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use blog_storage::Storage;
use blog_types::{Entity, EntityId, Indexable, Model, Page, SearchResult};

use crate::error::IndexingError;
use crate::synchronizer::IndexSynchronizer;

/// One page of resolved search hits.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage<T> {
    /// Entities in rank order
    pub items: Vec<T>,
    /// Total matches reported by the index; may exceed what resolves
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl<T> SearchPage<T> {
    pub fn empty(page: u64, per_page: u64) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page,
            per_page,
        }
    }

    /// Whether a later page may hold more hits
    pub fn has_next(&self) -> bool {
        self.page.saturating_mul(self.per_page) < self.total
    }

    /// Wrap into the API pagination envelope
    pub fn into_page(self, endpoint: &str) -> Page<T> {
        Page::new(self.items, self.total, self.page, self.per_page, endpoint)
    }
}

/// Re-order fetched rows by their position in `ranked_ids`.
///
/// Rows whose id is not ranked are dropped. A duplicated id keeps its
/// first position.
pub fn order_by_rank(ranked_ids: &[EntityId], rows: Vec<Entity>) -> Vec<Entity> {
    let mut positions: HashMap<EntityId, usize> = HashMap::with_capacity(ranked_ids.len());
    for (position, id) in ranked_ids.iter().enumerate() {
        positions.entry(*id).or_insert(position);
    }

    let mut ranked: Vec<(usize, Entity)> = rows
        .into_iter()
        .filter_map(|row| positions.get(&row.id()).map(|p| (*p, row)))
        .collect();
    ranked.sort_by_key(|(position, _)| *position);
    ranked.into_iter().map(|(_, row)| row).collect()
}

/// Answers search requests against the text index and primary store.
pub struct SearchQueryEngine {
    storage: Arc<Storage>,
    synchronizer: Arc<IndexSynchronizer>,
}

impl SearchQueryEngine {
    pub fn new(storage: Arc<Storage>, synchronizer: Arc<IndexSynchronizer>) -> Self {
        Self {
            storage,
            synchronizer,
        }
    }

    /// Ranked ids for one page and the total match count.
    ///
    /// Pages are 1-based; page 0 is treated as page 1. An unconfigured
    /// index or `per_page == 0` yields an empty result.
    pub fn search_ids(
        &self,
        index_name: &str,
        query: &str,
        page: u64,
        per_page: u64,
    ) -> Result<SearchResult, IndexingError> {
        let Some(index) = self.synchronizer.text_index() else {
            return Ok(SearchResult::empty());
        };
        if per_page == 0 {
            return Ok(SearchResult::empty());
        }

        let page = page.max(1);
        let offset = usize::try_from((page - 1).saturating_mul(per_page)).unwrap_or(usize::MAX);
        let limit = usize::try_from(per_page).unwrap_or(usize::MAX);
        let result = index.query(index_name, query, offset, limit)?;
        if result.total == 0 {
            return Ok(SearchResult::empty());
        }

        debug!(
            index = %index_name,
            query,
            page,
            hits = result.ids.len(),
            total = result.total,
            "Search ids"
        );
        Ok(result)
    }

    /// Search one entity type and fetch the hits in rank order.
    pub fn search<T: Model + Indexable>(
        &self,
        query: &str,
        page: u64,
        per_page: u64,
    ) -> Result<SearchPage<T>, IndexingError> {
        let page = page.max(1);
        let result = self.search_ids(T::TABLE, query, page, per_page)?;
        if result.ids.is_empty() {
            return Ok(SearchPage {
                total: result.total,
                ..SearchPage::empty(page, per_page)
            });
        }

        let rows = self.storage.fetch_by_ids(T::TABLE, &result.ids)?;
        let fetched = rows.len();
        let items: Vec<T> = order_by_rank(&result.ids, rows)
            .into_iter()
            .filter_map(T::from_entity)
            .collect();

        if fetched < result.ids.len() {
            debug!(
                index = %T::TABLE,
                ranked = result.ids.len(),
                fetched,
                "Dropped ids missing from the store"
            );
        }

        Ok(SearchPage {
            items,
            total: result.total,
            page,
            per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blog_search::{SearchIndexConfig, TantivyTextIndex, TextIndex};
    use blog_types::{IndexDocument, Post, User};
    use chrono::Utc;
    use tempfile::TempDir;

    fn post(id: EntityId) -> Entity {
        Post::new(1, format!("post {}", id), Utc::now())
            .with_id(id)
            .into_entity()
    }

    fn ids(rows: &[Entity]) -> Vec<EntityId> {
        rows.iter().map(|r| r.id()).collect()
    }

    #[test]
    fn test_order_by_rank_preserves_index_order() {
        let rows = vec![post(3), post(7), post(9)];
        let ordered = order_by_rank(&[7, 3, 9], rows);
        assert_eq!(ids(&ordered), vec![7, 3, 9]);
    }

    #[test]
    fn test_order_by_rank_drops_unranked_and_keeps_first_duplicate() {
        let rows = vec![post(1), post(2), post(5)];
        let ordered = order_by_rank(&[2, 1, 2, 8], rows);
        assert_eq!(ids(&ordered), vec![2, 1]);
    }

    struct Fixture {
        storage: Arc<Storage>,
        index: Arc<TantivyTextIndex>,
        engine: SearchQueryEngine,
        _db_dir: TempDir,
        _index_dir: TempDir,
    }

    fn setup() -> Fixture {
        let db_dir = TempDir::new().unwrap();
        let index_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(db_dir.path()).unwrap());
        let index =
            Arc::new(TantivyTextIndex::open(SearchIndexConfig::new(index_dir.path())).unwrap());
        let sync = Arc::new(IndexSynchronizer::new(Some(index.clone())));
        let engine = SearchQueryEngine::new(storage.clone(), sync);
        Fixture {
            storage,
            index,
            engine,
            _db_dir: db_dir,
            _index_dir: index_dir,
        }
    }

    fn store_posts(storage: &Storage, posts: &[(EntityId, &str)]) {
        let mut session = storage.session();
        let user_id = session.add(User::new("susan", "s@example.com")).unwrap();
        for (id, body) in posts {
            session
                .add(Post::new(user_id, *body, Utc::now()).with_id(*id))
                .unwrap();
        }
        session.commit().unwrap();
    }

    #[test]
    fn test_search_resolves_in_rank_order() {
        let f = setup();
        store_posts(
            &f.storage,
            &[(3, "rust"), (7, "rust rust rust rust"), (9, "rust and go and c and zig")],
        );
        for (id, body) in [(3, "rust"), (7, "rust rust rust rust"), (9, "rust and go and c and zig")] {
            f.index
                .upsert("post", &IndexDocument::new(id).with_field("body", body))
                .unwrap();
        }
        f.index.commit().unwrap();

        let ranked = f.engine.search_ids("post", "rust", 1, 10).unwrap();
        let page = f.engine.search::<Post>("rust", 1, 10).unwrap();
        let page_ids: Vec<EntityId> = page.items.iter().map(|p| p.id).collect();
        assert_eq!(page_ids, ranked.ids);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_index_lag_is_filtered() {
        let f = setup();
        store_posts(&f.storage, &[(1, "stale lag")]);
        for id in [1, 2] {
            f.index
                .upsert("post", &IndexDocument::new(id).with_field("body", "stale lag"))
                .unwrap();
        }
        f.index.commit().unwrap();

        let page = f.engine.search::<Post>("stale", 1, 10).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, 1);
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_pagination_windows() {
        let f = setup();
        let posts: Vec<(EntityId, &str)> = (1..=5).map(|id| (id, "paged content")).collect();
        store_posts(&f.storage, &posts);
        for (id, body) in &posts {
            f.index
                .upsert("post", &IndexDocument::new(*id).with_field("body", *body))
                .unwrap();
        }
        f.index.commit().unwrap();

        let first = f.engine.search::<Post>("paged", 1, 3).unwrap();
        let second = f.engine.search::<Post>("paged", 2, 3).unwrap();
        assert_eq!((first.items.len(), second.items.len()), (3, 2));
        assert!(first.has_next());
        assert!(!second.has_next());

        let envelope = second.into_page("/search");
        assert_eq!(envelope.total_pages, 2);
        assert_eq!(envelope.links.prev.as_deref(), Some("/search?page=1&per_page=3"));
        assert!(envelope.links.next.is_none());
    }

    #[test]
    fn test_page_past_end_keeps_total() {
        let f = setup();
        let posts: Vec<(EntityId, &str)> = (1..=5).map(|id| (id, "paged content")).collect();
        store_posts(&f.storage, &posts);
        for (id, body) in &posts {
            f.index
                .upsert("post", &IndexDocument::new(*id).with_field("body", *body))
                .unwrap();
        }
        f.index.commit().unwrap();

        let past = f.engine.search::<Post>("paged", 3, 3).unwrap();
        assert!(past.items.is_empty());
        assert_eq!(past.total, 5);
        assert!(!past.has_next());

        let envelope = past.into_page("/search");
        assert_eq!(envelope.total_pages, 2);
        assert!(envelope.links.next.is_none());
        assert_eq!(envelope.links.prev.as_deref(), Some("/search?page=2&per_page=3"));

        let far = f.engine.search::<Post>("paged", 1_000_000_001, 10).unwrap();
        assert!(far.items.is_empty());
        assert_eq!(far.total, 5);

        let huge = f.engine.search_ids("post", "paged", u64::MAX, u64::MAX).unwrap();
        assert!(huge.ids.is_empty());
        assert_eq!(huge.total, 5);
    }

    #[test]
    fn test_unconfigured_index_returns_nothing() {
        let db_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(db_dir.path()).unwrap());
        let engine = SearchQueryEngine::new(storage, Arc::new(IndexSynchronizer::disabled()));

        assert_eq!(
            engine.search_ids("post", "no-such-term", 1, 10).unwrap(),
            SearchResult::empty()
        );
        let page = engine.search::<Post>("anything", 1, 10).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_zero_page_size() {
        let f = setup();
        assert_eq!(
            f.engine.search_ids("post", "x", 1, 0).unwrap(),
            SearchResult::empty()
        );
    }
}
