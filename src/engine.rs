//! The retrieval engine.
//!
//! [`RetrievalEngine`] composes the query normalizer, the keyword index,
//! the external embedding/vector-search capabilities, fusion, and the
//! cross-encoder re-ranker into one [`retrieve`](RetrievalEngine::retrieve)
//! operation. One engine instance is constructed at process start and
//! shared by reference across request handlers; each request executes
//! independently against read-only state.
//!
//! # Degradation chain
//!
//! - Hybrid mode off: semantic-only search, by configuration.
//! - Keyword index absent or failing at query time: the request silently
//!   falls back to semantic-only search, logged as a warning and flagged
//!   on the response.
//! - No cross-encoder scorer at construction: re-ranking is disabled for
//!   the engine's lifetime, not retried per request.
//! - Cross-encoder failure at query time: candidates keep their incoming
//!   order (see [`crate::rerank`]).
//! - Embedding failure after bounded retries: fatal for that request,
//!   since without a query vector there is nothing to search.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use tokio::time::{Duration, sleep};

use crate::config::{MinScorePolicy, RetrievalConfig};
use crate::corpus::{CorpusItem, FilterSpec};
use crate::embedding::{EmbeddingCache, TextEmbedder};
use crate::error::{ArnikaError, Result};
use crate::fusion;
use crate::keyword::{KeywordIndex, KeywordIndexStats, persist};
use crate::query::QueryNormalizer;
use crate::rerank::{CrossEncoderReranker, CrossScorer};
use crate::search::{RetrievalHit, RetrievalResponse, SearchCandidate, StageTimings};
use crate::vector::VectorSearcher;

/// A retrieval request.
///
/// # Examples
///
/// ```
/// use arnika::engine::RetrievalRequest;
///
/// let request = RetrievalRequest::new("Welche Therapien bietet die Praxis an?")
///     .with_top_k(3)
///     .with_categories(vec!["angebote".to_string(), "therapien".to_string()])
///     .with_min_score(0.4);
/// ```
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    /// The raw query text.
    pub query: String,
    /// Number of results to return; engine default when unset.
    pub top_k: Option<usize>,
    /// Category filter (OR over the set).
    pub category: Option<Vec<String>>,
    /// Language filter; when unset, the detected query language is used.
    pub language: Option<String>,
    /// Source-type filter.
    pub source_type: Option<String>,
    /// Minimum score threshold; engine default when unset.
    pub min_score: Option<f32>,
    /// Best-effort cancellation flag, checked between pipeline stages.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl RetrievalRequest {
    /// Create a request for the given query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
            category: None,
            language: None,
            source_type: None,
            min_score: None,
            cancel: None,
        }
    }

    /// Set the number of results to return.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Filter results to any of the given categories.
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.category = Some(categories);
        self
    }

    /// Filter results to the given language, overriding detection.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Filter results to the given source type.
    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }

    /// Set the minimum score threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Attach a cancellation flag the pipeline checks between stages.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        if let Some(cancel) = &self.cancel
            && cancel.load(Ordering::Relaxed)
        {
            return Err(ArnikaError::cancelled("request cancelled by caller"));
        }
        Ok(())
    }
}

/// The retrieval orchestrator.
pub struct RetrievalEngine {
    config: RetrievalConfig,
    normalizer: QueryNormalizer,
    embedder: Arc<dyn TextEmbedder>,
    vector: Arc<dyn VectorSearcher>,
    reranker: Option<CrossEncoderReranker>,
    /// The active keyword index. Requests clone the `Arc` once and then
    /// read lock-free; rebuilds swap the slot atomically.
    keyword: RwLock<Option<Arc<KeywordIndex>>>,
    embed_cache: EmbeddingCache,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("config", &self.config)
            .field("rerank_active", &self.reranker.is_some())
            .finish_non_exhaustive()
    }
}

impl RetrievalEngine {
    /// Create an engine from a configuration and its external
    /// capabilities.
    ///
    /// Passing `None` for `cross_scorer` (or disabling re-ranking in the
    /// configuration) disables re-ranking for the engine's lifetime; it is
    /// not retried per request. The keyword index slot starts empty;
    /// install one via [`initialize_keyword_index`](Self::initialize_keyword_index)
    /// or [`load_keyword_index`](Self::load_keyword_index).
    ///
    /// # Errors
    ///
    /// Returns [`ArnikaError::Config`] when the embedder's dimension does
    /// not match the configured vector size.
    pub fn new(
        config: RetrievalConfig,
        embedder: Arc<dyn TextEmbedder>,
        vector: Arc<dyn VectorSearcher>,
        cross_scorer: Option<Arc<dyn CrossScorer>>,
    ) -> Result<Self> {
        if embedder.dimension() != config.vector_size {
            return Err(ArnikaError::config(format!(
                "embedder produces {}-dimensional vectors but vector_size is {}",
                embedder.dimension(),
                config.vector_size
            )));
        }

        let reranker = if config.rerank_enabled {
            match cross_scorer {
                Some(scorer) => Some(CrossEncoderReranker::new(scorer)),
                None => {
                    tracing::info!("no cross-encoder available, re-ranking disabled");
                    None
                }
            }
        } else {
            None
        };

        let normalizer = QueryNormalizer::new(config.max_query_length);
        let embed_cache = EmbeddingCache::new(config.embed_cache_size);

        Ok(Self {
            config,
            normalizer,
            embedder,
            vector,
            reranker,
            keyword: RwLock::new(None),
            embed_cache,
        })
    }

    /// Whether re-ranking will run for requests on this engine.
    pub fn rerank_active(&self) -> bool {
        self.reranker.is_some()
    }

    /// The engine's configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Snapshot of the active keyword index, if any.
    fn keyword_snapshot(&self) -> Option<Arc<KeywordIndex>> {
        self.keyword.read().clone()
    }

    /// Stats of the active keyword index, if any.
    pub fn keyword_index_stats(&self) -> Option<KeywordIndexStats> {
        self.keyword_snapshot().map(|index| index.stats())
    }

    /// Install a keyword index, atomically replacing any active one.
    ///
    /// In-flight requests keep reading the snapshot they already hold.
    pub fn install_keyword_index(&self, index: KeywordIndex) {
        *self.keyword.write() = Some(Arc::new(index));
    }

    /// One-time keyword index initialization from a corpus snapshot.
    ///
    /// Idempotent: if an index is already installed (including the case
    /// where a concurrent first-caller won the race while this one was
    /// building), the freshly built instance is discarded and `false` is
    /// returned.
    pub fn initialize_keyword_index(&self, corpus: Vec<CorpusItem>) -> Result<bool> {
        if self.keyword.read().is_some() {
            return Ok(false);
        }
        // Build off to the side; the slot stays readable throughout.
        let index = KeywordIndex::build(corpus, self.config.bm25_k1, self.config.bm25_b)?;
        let mut slot = self.keyword.write();
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(Arc::new(index));
        Ok(true)
    }

    /// Rebuild the keyword index from a fresh corpus snapshot.
    ///
    /// An administrative operation, not part of the request hot path: a
    /// complete new instance is built off to the side and swapped in
    /// atomically, so concurrent reads never see partial state.
    pub fn rebuild_keyword_index(&self, corpus: Vec<CorpusItem>) -> Result<()> {
        let index = KeywordIndex::build(corpus, self.config.bm25_k1, self.config.bm25_b)?;
        self.install_keyword_index(index);
        Ok(())
    }

    /// Load a persisted keyword index artifact and install it.
    pub fn load_keyword_index(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let index = persist::load(path)?;
        self.install_keyword_index(index);
        Ok(())
    }

    /// Save the active keyword index to disk.
    ///
    /// # Errors
    ///
    /// Returns [`ArnikaError::IndexUnavailable`] when no index is
    /// installed.
    pub fn save_keyword_index(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let index = self
            .keyword_snapshot()
            .ok_or_else(|| ArnikaError::index_unavailable("no keyword index installed"))?;
        persist::save(&index, path)
    }

    /// Retrieve relevant passages for a query.
    ///
    /// Pipeline: normalize → resolve effective language (an explicit
    /// request language wins over detection) → build filters → embed the
    /// query (cached, bounded retries) → fetch keyword and semantic
    /// candidates concurrently → fuse → re-rank → threshold → truncate.
    ///
    /// For an unchanged index and identical inputs the output ordering is
    /// exactly reproducible.
    pub async fn retrieve(&self, request: RetrievalRequest) -> Result<RetrievalResponse> {
        let started = Instant::now();
        let mut timings = StageTimings::default();

        let top_k = request.top_k.unwrap_or(self.config.top_k);
        let min_score = request.min_score.unwrap_or(self.config.min_score);

        // Stage 1: normalize and language-tag the query.
        let stage = Instant::now();
        let normalized = self.normalizer.normalize(&request.query)?;
        timings.normalize_ms = elapsed_ms(stage);
        tracing::debug!(
            normalized = %normalized.normalized,
            language = %normalized.detected_language,
            "query normalized"
        );

        // Stage 2: filters. An explicit language wins over detection.
        let effective_language = request
            .language
            .clone()
            .or_else(|| normalized.detected_language.code().map(String::from));
        let filters = FilterSpec {
            category: request.category.clone(),
            language: effective_language,
            source_type: request.source_type.clone(),
        };

        request.check_cancelled()?;

        // Stage 3: candidate pool sizing.
        let rerank_active = self.reranker.is_some();
        let candidate_k = self.config.candidate_pool_size(top_k, rerank_active);
        let rerank_k = self.config.rerank_k(top_k);

        // Stage 4: query embedding.
        let stage = Instant::now();
        let query_vector = self.embed_query(&normalized.normalized).await?;
        timings.embed_ms = elapsed_ms(stage);

        request.check_cancelled()?;

        // Stage 5: candidate fetch. Keyword scoring runs on a blocking
        // thread while the vector search capability is in flight.
        let stage = Instant::now();
        let keyword_index = if self.config.hybrid_enabled {
            self.keyword_snapshot()
        } else {
            None
        };
        let mut keyword_degraded = false;
        if self.config.hybrid_enabled && keyword_index.is_none() {
            tracing::warn!("hybrid enabled but no keyword index installed, semantic-only fallback");
            keyword_degraded = true;
        }
        let fetch_k = if keyword_index.is_some() {
            candidate_k * 2
        } else {
            candidate_k
        };
        let provider_threshold = (self.config.min_score_policy == MinScorePolicy::PreRerank
            && min_score > 0.0)
            .then_some(min_score);

        let semantic_fut = self
            .vector
            .search(&query_vector, fetch_k, &filters, provider_threshold);

        let (semantic_points, keyword_candidates) = match keyword_index {
            Some(index) => {
                let query = normalized.normalized.clone();
                let kw_filters = filters.clone();
                let keyword_fut = tokio::task::spawn_blocking(move || {
                    index.search(&query, fetch_k, Some(&kw_filters))
                });
                let (semantic, keyword) = futures::join!(semantic_fut, keyword_fut);
                let keyword = match keyword {
                    Ok(result) => result,
                    Err(join_error) => Err(ArnikaError::index_unavailable(format!(
                        "keyword search task failed: {join_error}"
                    ))),
                };
                let keyword = match keyword {
                    Ok(candidates) => Some(candidates),
                    Err(e) => {
                        tracing::warn!(error = %e, "keyword search failed, semantic-only fallback");
                        keyword_degraded = true;
                        None
                    }
                };
                (semantic?, keyword)
            }
            None => (semantic_fut.await?, None),
        };

        let semantic_candidates: Vec<SearchCandidate> = semantic_points
            .into_iter()
            .map(|point| {
                SearchCandidate::from_semantic(point.chunk_id, point.text, point.metadata, point.score)
            })
            .collect();

        // Stage 6: fusion (hybrid) or plain semantic ranking.
        let mut candidates = match keyword_candidates {
            Some(keyword) => fusion::fuse(&keyword, &semantic_candidates, &self.config.fusion),
            None => {
                let mut candidates = semantic_candidates;
                candidates.sort_by(|a, b| {
                    b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
                });
                candidates
            }
        };
        timings.search_ms = elapsed_ms(stage);

        if self.config.min_score_policy == MinScorePolicy::PreRerank && min_score > 0.0 {
            candidates.retain(|c| c.score >= min_score);
        }

        // The re-ranker is the most expensive stage; always check for
        // cancellation right before it.
        request.check_cancelled()?;

        // Stage 7: cross-encoder re-ranking.
        let mut rerank_degraded = false;
        let mut hits: Vec<RetrievalHit> = match &self.reranker {
            Some(reranker) => {
                candidates.truncate(candidate_k);
                let stage = Instant::now();
                let outcome = reranker
                    .rerank(&normalized.normalized, candidates, rerank_k)
                    .await;
                timings.rerank_ms = elapsed_ms(stage);
                rerank_degraded = outcome.degraded;
                outcome.results.into_iter().map(RetrievalHit::Reranked).collect()
            }
            None => candidates.into_iter().map(RetrievalHit::Fused).collect(),
        };

        // Stages 8-9: threshold and final truncation.
        if self.config.min_score_policy == MinScorePolicy::PostRerank && min_score > 0.0 {
            hits.retain(|hit| hit.score() >= min_score);
        }
        hits.truncate(top_k);

        let retrieval_time_ms = elapsed_ms(started);
        tracing::info!(
            results = hits.len(),
            time_ms = retrieval_time_ms,
            rerank_degraded,
            keyword_degraded,
            "retrieval complete"
        );

        Ok(RetrievalResponse {
            query: request.query,
            normalized_query: normalized.normalized,
            detected_language: normalized.detected_language,
            results: hits,
            filters_applied: filters,
            min_score,
            rerank_degraded,
            keyword_degraded,
            timings,
            retrieval_time_ms,
        })
    }

    /// Embed a query, consulting the cache first and retrying transient
    /// failures a bounded number of times with linear backoff.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(vector) = self.embed_cache.get(text) {
            tracing::debug!("query vector served from cache");
            return Ok(vector);
        }

        let mut attempt = 0;
        let vector = loop {
            match self.embedder.embed(text).await {
                Ok(vector) => break vector,
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.config.retry_backoff_ms * attempt as u64;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        backoff_ms = backoff,
                        "embedding failed, retrying"
                    );
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        };

        if vector.len() != self.config.vector_size {
            return Err(ArnikaError::DimensionMismatch {
                expected: self.config.vector_size,
                actual: vector.len(),
            });
        }

        self.embed_cache.put(text, vector.clone());
        Ok(vector)
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedEmbedder {
        dimension: usize,
    }

    #[async_trait]
    impl TextEmbedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; self.dimension])
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    struct EmptyVectorSearcher;

    #[async_trait]
    impl VectorSearcher for EmptyVectorSearcher {
        async fn search(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _filter: &FilterSpec,
            _score_threshold: Option<f32>,
        ) -> Result<Vec<crate::vector::ScoredPoint>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_dimension_mismatch_at_construction() {
        let mut config = RetrievalConfig::default();
        config.vector_size = 1024;

        let result = RetrievalEngine::new(
            config,
            Arc::new(FixedEmbedder { dimension: 768 }),
            Arc::new(EmptyVectorSearcher),
            None,
        );
        assert!(matches!(result.unwrap_err(), ArnikaError::Config(_)));
    }

    #[test]
    fn test_rerank_disabled_without_scorer() {
        let mut config = RetrievalConfig::default();
        config.vector_size = 4;

        let engine = RetrievalEngine::new(
            config,
            Arc::new(FixedEmbedder { dimension: 4 }),
            Arc::new(EmptyVectorSearcher),
            None,
        )
        .unwrap();
        assert!(!engine.rerank_active());
    }

    #[test]
    fn test_request_builder() {
        let request = RetrievalRequest::new("query")
            .with_top_k(7)
            .with_language("DE")
            .with_min_score(0.5);
        assert_eq!(request.top_k, Some(7));
        assert_eq!(request.language.as_deref(), Some("DE"));
        assert_eq!(request.min_score, Some(0.5));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut config = RetrievalConfig::default();
        config.vector_size = 4;
        let engine = RetrievalEngine::new(
            config,
            Arc::new(FixedEmbedder { dimension: 4 }),
            Arc::new(EmptyVectorSearcher),
            None,
        )
        .unwrap();

        let corpus = vec![CorpusItem::new(
            "d#0",
            "osteopathy for joint pain",
            Default::default(),
        )];
        assert!(engine.initialize_keyword_index(corpus.clone()).unwrap());
        assert!(!engine.initialize_keyword_index(corpus).unwrap());
        assert_eq!(engine.keyword_index_stats().unwrap().doc_count, 1);
    }
}
