//! # blog-search
//!
//! Full-text index for blog entities using Tantivy.
//!
//! The rest of the workspace talks to the index through the [`TextIndex`]
//! trait: upsert and delete documents keyed by entity id, and run ranked
//! queries that return ids plus a total match count.
//!
//! ## Features
//! - One embedded Tantivy index per index name, created on first use
//! - Schema derived from the entity's searchable fields
//! - BM25 ranking across every text field of an index
//! - Offset/limit windows with a separate total count

pub mod error;
pub mod index;
pub mod schema;
pub mod tantivy_index;
pub mod text_index;

pub use error::SearchError;
pub use index::{open_or_create_index, EntityIndex, SearchIndexConfig};
pub use schema::{EntitySchema, ID_FIELD};
pub use tantivy_index::TantivyTextIndex;
pub use text_index::TextIndex;
