//! Configuration for the retrieval pipeline.
//!
//! One immutable [`RetrievalConfig`] value is constructed at process start
//! and threaded explicitly into the engine and its components. There are no
//! hidden globals; changing a setting means building a new engine.
//!
//! # Examples
//!
//! ```
//! use arnika::config::RetrievalConfig;
//!
//! let mut config = RetrievalConfig::default();
//! assert_eq!(config.top_k, 5);
//! assert_eq!(config.bm25_k1, 1.5);
//!
//! // Semantic-only deployment without re-ranking
//! config.hybrid_enabled = false;
//! config.rerank_enabled = false;
//! ```

use serde::{Deserialize, Serialize};

use crate::fusion::FusionStrategy;

/// When the `min_score` threshold is applied relative to re-ranking.
///
/// Whether the threshold should judge the blended re-ranked score or the
/// pre-rerank retrieval score is a deployment policy, not a fixed rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MinScorePolicy {
    /// Filter candidates before re-ranking, on their incoming score. The
    /// threshold is also forwarded to the vector search capability.
    PreRerank,
    /// Filter final results after re-ranking, on the blended score. The
    /// more conservative reading: the threshold judges the score the
    /// caller actually sees.
    #[default]
    PostRerank,
}

/// Configuration for the retrieval engine.
///
/// All fields have documented defaults; construct with
/// `RetrievalConfig::default()` and override what the deployment needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of results to return (default: 5).
    pub top_k: usize,
    /// Default minimum score threshold; `0.0` disables it (default: 0.0).
    pub min_score: f32,
    /// Stage at which `min_score` is applied (default: post-rerank).
    pub min_score_policy: MinScorePolicy,
    /// Maximum query length in characters before hard truncation
    /// (default: 512).
    pub max_query_length: usize,
    /// Expected dimensionality of query/document vectors (default: 1024).
    pub vector_size: usize,
    /// Whether keyword search is fused with semantic search (default: true).
    pub hybrid_enabled: bool,
    /// Fusion strategy for hybrid mode (default: weighted, alpha 0.7).
    pub fusion: FusionStrategy,
    /// Whether cross-encoder re-ranking runs when a scorer is available
    /// (default: true).
    pub rerank_enabled: bool,
    /// Upper bound on how many results re-ranking may return, regardless
    /// of the requested `top_k` (default: 10).
    pub rerank_top_k_cap: usize,
    /// Candidate pool is `top_k * rerank_candidate_multiplier`, floored at
    /// [`rerank_candidate_floor`](Self::rerank_candidate_floor)
    /// (default: 10).
    pub rerank_candidate_multiplier: usize,
    /// Minimum candidate pool size handed to the re-ranker (default: 15).
    pub rerank_candidate_floor: usize,
    /// BM25 term frequency saturation parameter (default: 1.5).
    pub bm25_k1: f32,
    /// BM25 document length normalization parameter (default: 0.75).
    pub bm25_b: f32,
    /// Capacity of the per-query embedding cache; `0` disables caching
    /// (default: 256).
    pub embed_cache_size: usize,
    /// How many times a transient capability failure is retried
    /// (default: 2).
    pub max_retries: usize,
    /// Base backoff between retries in milliseconds; grows linearly with
    /// the attempt number (default: 100).
    pub retry_backoff_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.0,
            min_score_policy: MinScorePolicy::PostRerank,
            max_query_length: 512,
            vector_size: 1024,
            hybrid_enabled: true,
            fusion: FusionStrategy::default(),
            rerank_enabled: true,
            rerank_top_k_cap: 10,
            rerank_candidate_multiplier: 10,
            rerank_candidate_floor: 15,
            bm25_k1: 1.5,
            bm25_b: 0.75,
            embed_cache_size: 256,
            max_retries: 2,
            retry_backoff_ms: 100,
        }
    }
}

impl RetrievalConfig {
    /// Candidate pool size for a given `top_k`, honoring the re-ranking
    /// contract: re-ranking is only worth its cost over a pool of
    /// `max(top_k * multiplier, floor)` candidates.
    pub fn candidate_pool_size(&self, top_k: usize, rerank_active: bool) -> usize {
        if rerank_active {
            (top_k * self.rerank_candidate_multiplier).max(self.rerank_candidate_floor)
        } else {
            top_k
        }
    }

    /// Number of results re-ranking returns for a given `top_k`.
    pub fn rerank_k(&self, top_k: usize) -> usize {
        top_k.min(self.rerank_top_k_cap)
    }
}
