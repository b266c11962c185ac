//! Cross-encoder re-ranking.
//!
//! A cross-encoder scores a (query, passage) pair jointly, which is more
//! accurate than comparing independently computed vectors but far more
//! expensive, so it runs last, over a candidate pool the cheaper stages
//! have already narrowed. The scorer itself is an external capability
//! behind the [`CrossScorer`] trait; a scorer failure never fails the
//! request, it falls back to the candidates' incoming order.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::corpus::ChunkMetadata;
use crate::error::Result;
use crate::search::SearchCandidate;

/// Weight of the normalized cross-encoder score in the blended ranking.
const CROSS_ENCODER_WEIGHT: f32 = 0.7;
/// Weight of the candidate's incoming score in the blended ranking.
const INCOMING_WEIGHT: f32 = 0.3;

/// Trait for the external pairwise relevance scorer.
///
/// One call scores a whole batch: the implementation receives the query
/// and every candidate passage, and returns one raw score per passage in
/// the same order. Raw scores are unbounded; the re-ranker squashes them.
#[async_trait]
pub trait CrossScorer: Send + Sync {
    /// Score every `(query, passage)` pair in one batch.
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;
}

/// A re-ranked result with its score breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    /// Chunk id of the passage.
    pub chunk_id: String,
    /// The passage text.
    pub text: String,
    /// The score the candidate carried in (fused or single-source).
    pub bi_encoder_score: f32,
    /// Logistic-squashed cross-encoder score, in `[0, 1]`; `0.0` when the
    /// scorer was unavailable.
    pub cross_encoder_score: f32,
    /// Blended ranking score.
    pub final_score: f32,
    /// Chunk metadata.
    pub metadata: ChunkMetadata,
}

/// Outcome of a re-ranking pass.
#[derive(Debug, Clone)]
pub struct RerankOutcome {
    /// Re-ranked results, best first, at most `top_k` of them.
    pub results: Vec<RankedResult>,
    /// Whether the scorer failed and the incoming order was kept.
    pub degraded: bool,
}

/// Re-ranks candidate lists with an external cross-encoder.
pub struct CrossEncoderReranker {
    scorer: Arc<dyn CrossScorer>,
}

impl CrossEncoderReranker {
    /// Create a re-ranker around a scorer capability.
    pub fn new(scorer: Arc<dyn CrossScorer>) -> Self {
        Self { scorer }
    }

    /// Re-rank `candidates` against `query` and keep the best `top_k`.
    ///
    /// Raw scores are squashed to `[0, 1]` with the logistic function and
    /// blended with the incoming score (70% cross-encoder, 30% incoming).
    /// The sort is stable, so equal blends keep the incoming order.
    ///
    /// If the scorer call fails the request is not failed with it: the
    /// candidates come back in their incoming order, truncated to
    /// `top_k`, with [`RerankOutcome::degraded`] set. The failure is
    /// logged, not raised.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchCandidate>,
        top_k: usize,
    ) -> RerankOutcome {
        if candidates.is_empty() {
            return RerankOutcome {
                results: Vec::new(),
                degraded: false,
            };
        }

        let passages: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let raw_scores = match self.scorer.score(query, &passages).await {
            Ok(scores) if scores.len() == candidates.len() => scores,
            Ok(scores) => {
                tracing::warn!(
                    expected = candidates.len(),
                    got = scores.len(),
                    "cross-encoder returned wrong score count, keeping incoming order"
                );
                return Self::fallback(candidates, top_k);
            }
            Err(e) => {
                tracing::warn!(error = %e, "cross-encoder scoring failed, keeping incoming order");
                return Self::fallback(candidates, top_k);
            }
        };

        let mut results: Vec<RankedResult> = candidates
            .into_iter()
            .zip(raw_scores)
            .map(|(candidate, raw)| {
                let cross = sigmoid(raw);
                RankedResult {
                    final_score: CROSS_ENCODER_WEIGHT * cross
                        + INCOMING_WEIGHT * candidate.score,
                    chunk_id: candidate.chunk_id,
                    text: candidate.text,
                    bi_encoder_score: candidate.score,
                    cross_encoder_score: cross,
                    metadata: candidate.metadata,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);

        RerankOutcome {
            results,
            degraded: false,
        }
    }

    fn fallback(candidates: Vec<SearchCandidate>, top_k: usize) -> RerankOutcome {
        let mut results: Vec<RankedResult> = candidates
            .into_iter()
            .map(|candidate| RankedResult {
                final_score: candidate.score,
                chunk_id: candidate.chunk_id,
                text: candidate.text,
                bi_encoder_score: candidate.score,
                cross_encoder_score: 0.0,
                metadata: candidate.metadata,
            })
            .collect();
        results.truncate(top_k);

        RerankOutcome {
            results,
            degraded: true,
        }
    }
}

/// Logistic squashing of an unbounded score into `(0, 1)`.
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArnikaError;

    /// Scores each passage by naive token overlap with the query.
    struct OverlapScorer;

    #[async_trait]
    impl CrossScorer for OverlapScorer {
        async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
            let query_tokens: Vec<&str> = query.split_whitespace().collect();
            Ok(passages
                .iter()
                .map(|p| {
                    let p = p.to_lowercase();
                    query_tokens.iter().filter(|t| p.contains(&t.to_lowercase())).count()
                        as f32
                })
                .collect())
        }
    }

    /// Always fails, as an unreachable scoring service would.
    struct FailingScorer;

    #[async_trait]
    impl CrossScorer for FailingScorer {
        async fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>> {
            Err(ArnikaError::scorer("connection refused"))
        }
    }

    fn candidate(id: &str, text: &str, score: f32) -> SearchCandidate {
        SearchCandidate::from_semantic(id, text, ChunkMetadata::default(), score)
    }

    #[tokio::test]
    async fn test_rerank_orders_by_blended_score() {
        let reranker = CrossEncoderReranker::new(Arc::new(OverlapScorer));
        let candidates = vec![
            candidate("weak", "completely unrelated passage", 0.5),
            candidate("strong", "joint pain and joint mobility", 0.5),
        ];

        let outcome = reranker.rerank("joint pain", candidates, 2).await;
        assert!(!outcome.degraded);
        assert_eq!(outcome.results[0].chunk_id, "strong");
        assert!(outcome.results[0].final_score > outcome.results[1].final_score);
    }

    #[tokio::test]
    async fn test_cross_scores_squashed_to_unit_range() {
        let reranker = CrossEncoderReranker::new(Arc::new(OverlapScorer));
        let candidates = vec![candidate("a", "joint pain joint pain joint pain", 1.0)];

        let outcome = reranker.rerank("joint pain", candidates, 1).await;
        let result = &outcome.results[0];
        assert!(result.cross_encoder_score > 0.0 && result.cross_encoder_score < 1.0);
        assert!(
            (result.final_score
                - (0.7 * result.cross_encoder_score + 0.3 * result.bi_encoder_score))
                .abs()
                < 1e-6
        );
    }

    #[tokio::test]
    async fn test_fallback_keeps_incoming_order() {
        let reranker = CrossEncoderReranker::new(Arc::new(FailingScorer));
        let candidates = vec![
            candidate("first", "alpha", 0.9),
            candidate("second", "beta", 0.8),
            candidate("third", "gamma", 0.7),
        ];

        let outcome = reranker.rerank("anything", candidates, 2).await;
        assert!(outcome.degraded);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].chunk_id, "first");
        assert_eq!(outcome.results[1].chunk_id, "second");
        assert_eq!(outcome.results[0].final_score, 0.9);
        assert_eq!(outcome.results[0].cross_encoder_score, 0.0);
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let reranker = CrossEncoderReranker::new(Arc::new(OverlapScorer));
        let outcome = reranker.rerank("anything", Vec::new(), 3).await;
        assert!(outcome.results.is_empty());
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn test_truncates_to_top_k() {
        let reranker = CrossEncoderReranker::new(Arc::new(OverlapScorer));
        let candidates: Vec<_> = (0..10)
            .map(|i| candidate(&format!("c{i}"), "joint pain passage", 0.5))
            .collect();

        let outcome = reranker.rerank("joint pain", candidates, 3).await;
        assert_eq!(outcome.results.len(), 3);
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }
}
