//! Keyword (BM25) indexing and search.
//!
//! The keyword index is built once from a full corpus snapshot and is
//! read-only during serving; an administrative rebuild produces a brand-new
//! instance that the engine swaps in atomically. The module also provides
//! the versioned, checksummed on-disk artifact the index round-trips
//! through.

pub mod index;
pub mod persist;

pub use index::{KeywordIndex, KeywordIndexStats};
