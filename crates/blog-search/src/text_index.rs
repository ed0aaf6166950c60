//! The external text index contract.

use blog_types::{EntityId, IndexDocument, SearchResult};

use crate::error::SearchError;

/// A full-text index keyed by entity id, partitioned by index name.
///
/// Writes are buffered until [`TextIndex::commit`].
pub trait TextIndex: Send + Sync {
    /// Insert or replace the document with `doc.id`. Writing the same id
    /// twice overwrites, never duplicates.
    fn upsert(&self, index: &str, doc: &IndexDocument) -> Result<(), SearchError>;

    /// Remove the document with `id`. Deleting a missing id is not an error.
    fn delete(&self, index: &str, id: EntityId) -> Result<(), SearchError>;

    /// Relevance-ranked ids for the `offset..offset + limit` window, plus
    /// the total number of matches.
    fn query(
        &self,
        index: &str,
        text: &str,
        offset: usize,
        limit: usize,
    ) -> Result<SearchResult, SearchError>;

    /// Make buffered writes visible to queries.
    fn commit(&self) -> Result<(), SearchError>;
}
