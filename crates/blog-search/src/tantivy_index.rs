//! Tantivy-backed [`TextIndex`].
//!
//! Indexes are opened lazily: on first write an index is created with the
//! fields of the written document; on first query an index that exists on
//! disk is opened, and one that does not is treated as empty.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tantivy::collector::{Count, TopDocs};
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{TantivyDocument, Term};
use tracing::{debug, info, warn};

use blog_types::{EntityId, IndexDocument, SearchResult};

use crate::error::SearchError;
use crate::index::{EntityIndex, SearchIndexConfig};
use crate::text_index::TextIndex;

/// Text index holding one Tantivy index per index name.
pub struct TantivyTextIndex {
    config: SearchIndexConfig,
    indexes: RwLock<HashMap<String, Arc<EntityIndex>>>,
}

impl TantivyTextIndex {
    pub fn open(config: SearchIndexConfig) -> Result<Self, SearchError> {
        std::fs::create_dir_all(&config.root_path)?;
        info!(root = ?config.root_path, "Opened text index root");
        Ok(Self {
            config,
            indexes: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &SearchIndexConfig {
        &self.config
    }

    fn validate_name(name: &str) -> Result<(), SearchError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(())
        } else {
            Err(SearchError::InvalidIndexName(name.to_string()))
        }
    }

    fn cached(&self, name: &str) -> Result<Option<Arc<EntityIndex>>, SearchError> {
        let indexes = self
            .indexes
            .read()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;
        Ok(indexes.get(name).cloned())
    }

    /// Open or create an index that has at least the given fields.
    pub fn ensure_index(
        &self,
        name: &str,
        searchable_fields: &[&str],
    ) -> Result<Arc<EntityIndex>, SearchError> {
        if let Some(index) = self.cached(name)? {
            index.schema().ensure_fields(searchable_fields.iter().copied())?;
            return Ok(index);
        }
        Self::validate_name(name)?;

        let mut indexes = self
            .indexes
            .write()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;
        if let Some(index) = indexes.get(name) {
            index.schema().ensure_fields(searchable_fields.iter().copied())?;
            return Ok(index.clone());
        }
        let index = Arc::new(EntityIndex::open_or_create(
            name,
            &self.config.index_path(name),
            searchable_fields,
            self.config.writer_memory_mb,
        )?);
        indexes.insert(name.to_string(), index.clone());
        Ok(index)
    }

    /// The named index if it is open or exists on disk.
    pub fn existing_index(&self, name: &str) -> Result<Option<Arc<EntityIndex>>, SearchError> {
        if let Some(index) = self.cached(name)? {
            return Ok(Some(index));
        }
        if Self::validate_name(name).is_err() {
            return Ok(None);
        }
        let path = self.config.index_path(name);
        if !path.join("meta.json").exists() {
            return Ok(None);
        }

        let mut indexes = self
            .indexes
            .write()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;
        if let Some(index) = indexes.get(name) {
            return Ok(Some(index.clone()));
        }
        let index = Arc::new(EntityIndex::open_existing(
            name,
            &path,
            self.config.writer_memory_mb,
        )?);
        indexes.insert(name.to_string(), index.clone());
        Ok(Some(index))
    }

    /// Names of indexes open in this process
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .indexes
            .read()
            .map(|indexes| indexes.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Number of committed documents in an index, 0 if it does not exist.
    pub fn num_docs(&self, name: &str) -> Result<u64, SearchError> {
        Ok(self
            .existing_index(name)?
            .map(|index| index.num_docs())
            .unwrap_or(0))
    }
}

impl TextIndex for TantivyTextIndex {
    fn upsert(&self, index: &str, doc: &IndexDocument) -> Result<(), SearchError> {
        let fields: Vec<&str> = doc.field_names().collect();
        let entity_index = self.ensure_index(index, &fields)?;
        let schema = entity_index.schema();
        let tantivy_doc = schema.to_document(doc)?;

        {
            let writer = entity_index.writer()?;
            writer.delete_term(Term::from_field_u64(schema.id, doc.id));
            writer.add_document(tantivy_doc)?;
        }
        entity_index.mark_dirty();

        debug!(index = %index, id = doc.id, "Upserted document");
        Ok(())
    }

    fn delete(&self, index: &str, id: EntityId) -> Result<(), SearchError> {
        let Some(entity_index) = self.existing_index(index)? else {
            debug!(index = %index, id, "Delete on missing index ignored");
            return Ok(());
        };

        {
            let writer = entity_index.writer()?;
            writer.delete_term(Term::from_field_u64(entity_index.schema().id, id));
        }
        entity_index.mark_dirty();

        debug!(index = %index, id, "Deleted document");
        Ok(())
    }

    fn query(
        &self,
        index: &str,
        text: &str,
        offset: usize,
        limit: usize,
    ) -> Result<SearchResult, SearchError> {
        if text.trim().is_empty() || limit == 0 {
            return Ok(SearchResult::empty());
        }
        let Some(entity_index) = self.existing_index(index)? else {
            debug!(index = %index, "Query on missing index");
            return Ok(SearchResult::empty());
        };

        let schema = entity_index.schema();
        let query_parser = QueryParser::for_index(entity_index.index(), schema.text_fields());
        let (query, errors) = query_parser.parse_query_lenient(text);
        if !errors.is_empty() {
            warn!(index = %index, query = text, errors = errors.len(), "Query parsed leniently");
        }

        let searcher = entity_index.reader().searcher();
        // TopDocs preallocates offset + limit slots, so bound both by the hit count first
        let total = searcher.search(&query, &Count)?;
        if offset >= total {
            debug!(index = %index, query = text, offset, total, "Page past last hit");
            return Ok(SearchResult {
                ids: Vec::new(),
                total: total as u64,
            });
        }
        let limit = limit.min(total - offset);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit).and_offset(offset))?;

        let mut ids = Vec::with_capacity(top_docs.len());
        for (_score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            if let Some(id) = doc.get_first(schema.id).and_then(|v| v.as_u64()) {
                ids.push(id);
            }
        }

        debug!(index = %index, query = text, hits = ids.len(), total, "Query complete");
        Ok(SearchResult {
            ids,
            total: total as u64,
        })
    }

    fn commit(&self) -> Result<(), SearchError> {
        let indexes: Vec<Arc<EntityIndex>> = self
            .indexes
            .read()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?
            .values()
            .cloned()
            .collect();

        for index in indexes {
            if let Some(opstamp) = index.commit()? {
                info!(index = %index.name(), opstamp, "Committed index changes");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_index() -> (TempDir, TantivyTextIndex) {
        let temp_dir = TempDir::new().unwrap();
        let index = TantivyTextIndex::open(SearchIndexConfig::new(temp_dir.path())).unwrap();
        (temp_dir, index)
    }

    fn post(id: EntityId, body: &str) -> IndexDocument {
        IndexDocument::new(id).with_field("body", body)
    }

    #[test]
    fn test_upsert_and_query() {
        let (_temp, index) = setup_index();
        index.upsert("post", &post(42, "hello world")).unwrap();
        index.upsert("post", &post(7, "goodbye world")).unwrap();
        index.commit().unwrap();

        let result = index.query("post", "hello", 0, 10).unwrap();
        assert_eq!(result.ids, vec![42]);
        assert_eq!(result.total, 1);

        let result = index.query("post", "world", 0, 10).unwrap();
        assert_eq!(result.total, 2);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let (_temp, index) = setup_index();
        index.upsert("post", &post(1, "rust tantivy")).unwrap();
        index.upsert("post", &post(1, "rust tantivy")).unwrap();
        index.commit().unwrap();

        let result = index.query("post", "rust", 0, 10).unwrap();
        assert_eq!(result.ids, vec![1]);
        assert_eq!(result.total, 1);
        assert_eq!(index.num_docs("post").unwrap(), 1);
    }

    #[test]
    fn test_upsert_replaces_content() {
        let (_temp, index) = setup_index();
        index.upsert("post", &post(1, "old words")).unwrap();
        index.commit().unwrap();
        index.upsert("post", &post(1, "new words")).unwrap();
        index.commit().unwrap();

        assert_eq!(index.query("post", "old", 0, 10).unwrap().total, 0);
        assert_eq!(index.query("post", "new", 0, 10).unwrap().ids, vec![1]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_temp, index) = setup_index();
        index.upsert("post", &post(3, "short lived")).unwrap();
        index.commit().unwrap();

        index.delete("post", 3).unwrap();
        index.delete("post", 3).unwrap();
        index.delete("post", 404).unwrap();
        index.commit().unwrap();

        assert_eq!(index.query("post", "short", 0, 10).unwrap(), SearchResult::empty());
    }

    #[test]
    fn test_delete_on_missing_index() {
        let (_temp, index) = setup_index();
        index.delete("post", 1).unwrap();
        assert!(index.index_names().is_empty());
    }

    #[test]
    fn test_zero_result_contract() {
        let (_temp, index) = setup_index();
        assert_eq!(
            index.query("post", "no-such-term", 0, 10).unwrap(),
            SearchResult::empty()
        );

        index.upsert("post", &post(1, "something")).unwrap();
        index.commit().unwrap();
        assert_eq!(index.query("post", "   ", 0, 10).unwrap(), SearchResult::empty());
        assert_eq!(index.query("post", "something", 0, 0).unwrap(), SearchResult::empty());
    }

    #[test]
    fn test_offset_window_keeps_total() {
        let (_temp, index) = setup_index();
        for id in 1..=5 {
            index.upsert("post", &post(id, "shared term")).unwrap();
        }
        index.commit().unwrap();

        let first = index.query("post", "shared", 0, 2).unwrap();
        let second = index.query("post", "shared", 2, 2).unwrap();
        let last = index.query("post", "shared", 4, 2).unwrap();
        assert_eq!((first.ids.len(), second.ids.len(), last.ids.len()), (2, 2, 1));
        assert_eq!((first.total, second.total, last.total), (5, 5, 5));

        let mut all: Vec<EntityId> = first.ids;
        all.extend(second.ids);
        all.extend(last.ids);
        all.sort();
        assert_eq!(all, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_offset_past_end_returns_total() {
        let (_temp, index) = setup_index();
        index.upsert("post", &post(1, "hello world")).unwrap();
        index.commit().unwrap();

        let result = index.query("post", "hello", 10_000_000_000, 10).unwrap();
        assert!(result.ids.is_empty());
        assert_eq!(result.total, 1);

        let result = index.query("post", "hello", 1, 10).unwrap();
        assert!(result.ids.is_empty());
        assert_eq!(result.total, 1);

        let result = index.query("post", "hello", 0, usize::MAX).unwrap();
        assert_eq!(result.ids, vec![1]);
    }

    #[test]
    fn test_relevance_ranking() {
        let (_temp, index) = setup_index();
        index.upsert("post", &post(1, "rust once")).unwrap();
        index
            .upsert("post", &post(2, "rust rust rust everywhere rust"))
            .unwrap();
        index.commit().unwrap();

        let result = index.query("post", "rust", 0, 10).unwrap();
        assert_eq!(result.ids, vec![2, 1]);
    }

    #[test]
    fn test_malformed_query_is_lenient() {
        let (_temp, index) = setup_index();
        index.upsert("post", &post(1, "hello world")).unwrap();
        index.commit().unwrap();

        assert!(index.query("post", "hello AND (", 0, 10).is_ok());
    }

    #[test]
    fn test_uncommitted_writes_invisible() {
        let (_temp, index) = setup_index();
        index.upsert("post", &post(1, "pending")).unwrap();
        assert_eq!(index.query("post", "pending", 0, 10).unwrap().total, 0);
        index.commit().unwrap();
        assert_eq!(index.query("post", "pending", 0, 10).unwrap().total, 1);
    }

    #[test]
    fn test_reopen_sees_committed_documents() {
        let temp_dir = TempDir::new().unwrap();
        {
            let index = TantivyTextIndex::open(SearchIndexConfig::new(temp_dir.path())).unwrap();
            index.upsert("post", &post(9, "persisted text")).unwrap();
            index.commit().unwrap();
        }
        let index = TantivyTextIndex::open(SearchIndexConfig::new(temp_dir.path())).unwrap();
        assert_eq!(index.query("post", "persisted", 0, 10).unwrap().ids, vec![9]);
    }

    #[test]
    fn test_schema_mismatch_on_new_field() {
        let (_temp, index) = setup_index();
        index.upsert("post", &post(1, "body only")).unwrap();

        let doc = IndexDocument::new(2)
            .with_field("body", "x")
            .with_field("title", "y");
        assert!(matches!(
            index.upsert("post", &doc),
            Err(SearchError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_invalid_index_name() {
        let (_temp, index) = setup_index();
        assert!(matches!(
            index.upsert("../escape", &post(1, "x")),
            Err(SearchError::InvalidIndexName(_))
        ));
        assert_eq!(
            index.query("../escape", "x", 0, 10).unwrap(),
            SearchResult::empty()
        );
    }
}
