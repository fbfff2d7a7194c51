pub mod format;
pub mod builder;
pub mod reader;

use std::sync::Arc;
use crate::ircore::common::DocId;
pub use format::{DocDetails, DocStats, IndexMeta, Posting};
pub use builder::IndexBuilder;
pub use reader::Index;

/// A document materialized at some [`DocTier`](crate::ircore::common::DocTier).
/// Lower tiers leave the richer fields empty.
#[derive(Debug, Clone, PartialEq)]
pub struct DocInfo {
    pub doc_id: DocId,
    pub id: Arc<str>,
    pub stats: Option<DocStats>,
    pub details: Option<DocDetails>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostingEntry {
    pub posting: Posting,
    pub doc: DocInfo,
}

/// Postings of one query term, ascending doc id. Empty when the term is unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct TermPostings {
    pub term: String,
    pub df: u32,
    pub entries: Vec<PostingEntry>,
}
