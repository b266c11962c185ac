//! Candidate and response types for the retrieval pipeline.
//!
//! A [`SearchCandidate`] flows through keyword search, fusion, and
//! re-ranking; the orchestrator assembles the final [`RetrievalResponse`]
//! from either re-ranked results or raw candidates, depending on which
//! stages ran.

use serde::{Deserialize, Serialize};

use crate::corpus::{ChunkMetadata, FilterSpec};
use crate::query::Language;
use crate::rerank::RankedResult;

/// A candidate passage produced by keyword search, semantic search, or
/// their fusion.
///
/// `bm25_score` and `semantic_score` are each in `[0, 1]` where populated
/// and `0` where the candidate was absent from that source. `score` is the
/// candidate's current ranking score: the single-source score before
/// fusion, the fused score after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCandidate {
    /// Globally unique chunk identifier.
    pub chunk_id: String,
    /// The passage text.
    pub text: String,
    /// Chunk metadata.
    pub metadata: ChunkMetadata,
    /// Keyword-channel score, `0.0` when absent from keyword results.
    pub bm25_score: f32,
    /// Semantic-channel score, `0.0` when absent from semantic results.
    pub semantic_score: f32,
    /// Current ranking score (single-source or fused).
    pub score: f32,
}

impl SearchCandidate {
    /// Create a candidate from a keyword search hit.
    pub fn from_bm25(
        chunk_id: impl Into<String>,
        text: impl Into<String>,
        metadata: ChunkMetadata,
        score: f32,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            text: text.into(),
            metadata,
            bm25_score: score,
            semantic_score: 0.0,
            score,
        }
    }

    /// Create a candidate from a semantic search hit.
    pub fn from_semantic(
        chunk_id: impl Into<String>,
        text: impl Into<String>,
        metadata: ChunkMetadata,
        score: f32,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            text: text.into(),
            metadata,
            bm25_score: 0.0,
            semantic_score: score,
            score,
        }
    }
}

/// One entry in a retrieval response.
///
/// Re-ranked and non-re-ranked requests produce different result shapes;
/// the variants keep them apart instead of zeroing out fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrievalHit {
    /// A cross-encoder re-ranked result.
    Reranked(RankedResult),
    /// A candidate straight from search/fusion (re-ranking disabled or
    /// degraded away).
    Fused(SearchCandidate),
}

impl RetrievalHit {
    /// The chunk id of this hit.
    pub fn chunk_id(&self) -> &str {
        match self {
            RetrievalHit::Reranked(r) => &r.chunk_id,
            RetrievalHit::Fused(c) => &c.chunk_id,
        }
    }

    /// The passage text of this hit.
    pub fn text(&self) -> &str {
        match self {
            RetrievalHit::Reranked(r) => &r.text,
            RetrievalHit::Fused(c) => &c.text,
        }
    }

    /// The ranking score of this hit (blended when re-ranked).
    pub fn score(&self) -> f32 {
        match self {
            RetrievalHit::Reranked(r) => r.final_score,
            RetrievalHit::Fused(c) => c.score,
        }
    }

    /// The chunk metadata of this hit.
    pub fn metadata(&self) -> &ChunkMetadata {
        match self {
            RetrievalHit::Reranked(r) => &r.metadata,
            RetrievalHit::Fused(c) => &c.metadata,
        }
    }
}

/// Wall-clock time spent in each pipeline stage, in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTimings {
    /// Query normalization.
    pub normalize_ms: f64,
    /// Query embedding (including cache lookups and retries).
    pub embed_ms: f64,
    /// Candidate fetch (keyword + semantic, overlapped) and fusion.
    pub search_ms: f64,
    /// Cross-encoder re-ranking.
    pub rerank_ms: f64,
}

/// Terminal output of the retrieval orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResponse {
    /// The raw query as received.
    pub query: String,
    /// The normalized query text actually searched.
    pub normalized_query: String,
    /// Language detected during normalization.
    pub detected_language: Language,
    /// Ordered results, best first.
    pub results: Vec<RetrievalHit>,
    /// The metadata filter that was applied.
    pub filters_applied: FilterSpec,
    /// The minimum-score threshold that was applied.
    pub min_score: f32,
    /// Re-ranking was requested but fell back to incoming order.
    pub rerank_degraded: bool,
    /// Hybrid search was requested but fell back to semantic-only.
    pub keyword_degraded: bool,
    /// Per-stage timings.
    pub timings: StageTimings,
    /// Total retrieval time in milliseconds.
    pub retrieval_time_ms: f64,
}
