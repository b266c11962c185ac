//! Vector (semantic) search capability.
//!
//! Approximate nearest-neighbor search over document vectors lives in an
//! external index (e.g. a vector database); this crate consumes it through
//! the [`VectorSearcher`] trait and never sees vector internals beyond the
//! scored points it returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::corpus::{ChunkMetadata, FilterSpec};
use crate::error::Result;

/// One scored hit from the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    /// Chunk id of the hit.
    pub chunk_id: String,
    /// Similarity score, in `[0, 1]`.
    pub score: f32,
    /// The passage text.
    pub text: String,
    /// Chunk metadata payload.
    pub metadata: ChunkMetadata,
}

/// Trait for the external vector similarity search capability.
///
/// Implementations must honor the same filter semantics as the keyword
/// index: `category` is an OR over the provided set, `language` and
/// `source_type` match exactly, provided fields combine with AND, and a
/// field missing from a point's payload never excludes that point.
///
/// Calls are potentially slow, blocking operations; implementors should
/// not hold locks across them.
#[async_trait]
pub trait VectorSearcher: Send + Sync {
    /// Search for the `top_k` nearest neighbors of `vector`.
    ///
    /// `score_threshold`, when set, drops hits scoring below it on the
    /// provider side.
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &FilterSpec,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>>;
}
