//! Search-index synchronization for the blog engine.
//!
//! Keeps the external text index consistent with the primary store and
//! answers ranked queries against it.
//!
//! ## Key Components
//!
//! - [`SearchSyncListener`]: commit listener that captures a [`ChangeSet`]
//!   before each commit and applies it after a successful one
//! - [`IndexSynchronizer`]: pushes change sets into a [`TextIndex`], or does
//!   nothing when no index is configured
//! - [`SearchQueryEngine`]: runs a query and resolves the ranked ids back to
//!   stored entities without losing rank order
//! - [`reindex`]: full rebuild of one entity type, the recovery path after a
//!   crash between commit and synchronization
//!
//! [`ChangeSet`]: blog_types::ChangeSet
//! [`TextIndex`]: blog_search::TextIndex

pub mod capture;
pub mod error;
pub mod query;
pub mod reindex;
pub mod synchronizer;

pub use capture::SearchSyncListener;
pub use error::IndexingError;
pub use query::{order_by_rank, SearchPage, SearchQueryEngine};
pub use reindex::{
    reindex, LoggingProgressCallback, NoOpProgressCallback, ProgressCallback, ReindexConfig,
    ReindexProgress,
};
pub use synchronizer::{IndexSynchronizer, SyncReport};
