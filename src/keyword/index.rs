//! The BM25 keyword index.

use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::tokenize;
use crate::corpus::{ChunkMetadata, CorpusItem, FilterSpec, validate_corpus};
use crate::error::{ArnikaError, Result};
use crate::search::SearchCandidate;

/// One corpus item with its precomputed term statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IndexedItem {
    pub chunk_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Token -> occurrence count within this item.
    pub term_freqs: AHashMap<String, u32>,
    /// Document length in tokens.
    pub token_count: u32,
}

/// Summary statistics of a keyword index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordIndexStats {
    /// Number of indexed chunks.
    pub doc_count: usize,
    /// Number of unique terms across the corpus.
    pub unique_terms: usize,
    /// Average document length in tokens.
    pub avg_doc_len: f32,
    /// The k1 tuning constant the index was built with.
    pub k1: f32,
    /// The b tuning constant the index was built with.
    pub b: f32,
}

/// An inverted-statistics BM25 index over a corpus snapshot.
///
/// Built once via [`KeywordIndex::build`]; all serving reads are lock-free
/// because the structure is never mutated after construction. Rebuilding
/// means building a new instance and swapping the reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordIndex {
    k1: f32,
    b: f32,
    items: Vec<IndexedItem>,
    /// Term -> inverse document frequency, always non-negative.
    idf: AHashMap<String, f32>,
    avg_doc_len: f32,
}

impl KeywordIndex {
    /// Build an index from a full corpus snapshot.
    ///
    /// The corpus is validated first (unique `chunk_id`s, non-empty
    /// texts). An empty corpus produces an empty index whose
    /// [`search`](Self::search) reports [`ArnikaError::IndexUnavailable`].
    ///
    /// # Errors
    ///
    /// Returns [`ArnikaError::Corpus`] when validation fails.
    pub fn build(corpus: Vec<CorpusItem>, k1: f32, b: f32) -> Result<Self> {
        validate_corpus(&corpus)?;

        let items: Vec<IndexedItem> = corpus
            .into_iter()
            .map(|item| {
                let tokens = tokenize(&item.text);
                let mut term_freqs: AHashMap<String, u32> = AHashMap::new();
                let token_count = tokens.len() as u32;
                for token in tokens {
                    *term_freqs.entry(token).or_insert(0) += 1;
                }
                IndexedItem {
                    chunk_id: item.chunk_id,
                    text: item.text,
                    metadata: item.metadata,
                    term_freqs,
                    token_count,
                }
            })
            .collect();

        let doc_count = items.len();
        let avg_doc_len = if doc_count > 0 {
            items.iter().map(|i| i.token_count as f64).sum::<f64>() as f32 / doc_count as f32
        } else {
            0.0
        };

        // Document frequency per term, then idf(t) = ln((N - df + 0.5) / (df + 0.5) + 1).
        // The +1 inside the log keeps every weight non-negative.
        let mut doc_freqs: AHashMap<String, u32> = AHashMap::new();
        for item in &items {
            for term in item.term_freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
        }
        let idf: AHashMap<String, f32> = doc_freqs
            .into_iter()
            .map(|(term, df)| {
                let weight = ((doc_count as f64 - df as f64 + 0.5) / (df as f64 + 0.5) + 1.0)
                    .ln() as f32;
                (term, weight)
            })
            .collect();

        tracing::info!(
            docs = doc_count,
            unique_terms = idf.len(),
            avg_doc_len,
            "keyword index built"
        );

        Ok(Self {
            k1,
            b,
            items,
            idf,
            avg_doc_len,
        })
    }

    /// Number of indexed chunks.
    pub fn doc_count(&self) -> usize {
        self.items.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Summary statistics for introspection and the CLI.
    pub fn stats(&self) -> KeywordIndexStats {
        KeywordIndexStats {
            doc_count: self.items.len(),
            unique_terms: self.idf.len(),
            avg_doc_len: self.avg_doc_len,
            k1: self.k1,
            b: self.b,
        }
    }

    /// Search the index with BM25 scoring.
    ///
    /// Items failing the filter are excluded before ranking. Scores are
    /// normalized to `[0, 1]` by dividing by the maximum score of the
    /// current batch. This is intentional: raw scores are not
    /// comparable across different queries or corpora. The sort is stable,
    /// so tied scores keep corpus insertion order, and only items scoring
    /// `> 0` are returned, truncated to `k`.
    ///
    /// # Errors
    ///
    /// Returns [`ArnikaError::IndexUnavailable`] when the index is empty.
    pub fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&FilterSpec>,
    ) -> Result<Vec<SearchCandidate>> {
        if self.items.is_empty() {
            return Err(ArnikaError::index_unavailable("index holds no documents"));
        }

        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            tracing::debug!(query, "query tokenized to nothing");
            return Ok(Vec::new());
        }

        // Score every item in corpus order; filtered-out items score 0 and
        // never enter the ranking.
        let mut scores: Vec<f32> = self
            .items
            .par_iter()
            .map(|item| {
                if let Some(filter) = filter
                    && !filter.matches(&item.metadata)
                {
                    return 0.0;
                }
                self.score_item(item, &query_tokens)
            })
            .collect();

        let max_score = scores.iter().cloned().fold(0.0f32, f32::max);
        if max_score > 0.0 {
            for score in &mut scores {
                *score /= max_score;
            }
        }

        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        // Stable: ties keep corpus insertion order.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|(idx, score)| {
                let item = &self.items[idx];
                SearchCandidate::from_bm25(
                    item.chunk_id.clone(),
                    item.text.clone(),
                    item.metadata.clone(),
                    score,
                )
            })
            .collect())
    }

    fn score_item(&self, item: &IndexedItem, query_tokens: &[String]) -> f32 {
        let doc_len = item.token_count as f32;
        let mut score = 0.0f32;
        for token in query_tokens {
            let Some(&freq) = item.term_freqs.get(token) else {
                continue;
            };
            let idf = self.idf.get(token).copied().unwrap_or(0.0);
            let freq = freq as f32;
            let numerator = freq * (self.k1 + 1.0);
            let denominator =
                freq + self.k1 * (1.0 - self.b + self.b * (doc_len / self.avg_doc_len));
            score += idf * (numerator / denominator);
        }
        score
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::ChunkMetadata;

    fn item(id: &str, text: &str, category: &str) -> CorpusItem {
        CorpusItem::new(
            id,
            text,
            ChunkMetadata {
                source_document: "doc.md".to_string(),
                category: category.to_string(),
                language: None,
                source_type: "text".to_string(),
                chunk_index: 0,
                total_chunks: 1,
            },
        )
    }

    fn clinic_corpus() -> Vec<CorpusItem> {
        vec![
            item(
                "d1",
                "Osteopathy treats joint pain and mobility issues",
                "angebote",
            ),
            item(
                "d2",
                "Physiotherapy improves muscle strength after injury",
                "angebote",
            ),
            item(
                "d3",
                "Our clinic is open Monday to Friday nine to five",
                "praxis-info",
            ),
        ]
    }

    fn build(corpus: Vec<CorpusItem>) -> KeywordIndex {
        KeywordIndex::build(corpus, 1.5, 0.75).unwrap()
    }

    #[test]
    fn test_build_stats() {
        let index = build(clinic_corpus());
        let stats = index.stats();
        assert_eq!(stats.doc_count, 3);
        assert!(stats.unique_terms > 0);
        assert!(stats.avg_doc_len > 0.0);
        assert_eq!(stats.k1, 1.5);
        assert_eq!(stats.b, 0.75);
    }

    #[test]
    fn test_joint_pain_scenario() {
        let index = build(clinic_corpus());
        let results = index.search("joint pain treatment", 2, None).unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].chunk_id, "d1");
        // d3 has zero token overlap and must not appear.
        assert!(results.iter().all(|r| r.chunk_id != "d3"));
    }

    #[test]
    fn test_scores_normalized_to_unit_range() {
        let index = build(clinic_corpus());
        let results = index.search("joint pain", 3, None).unwrap();
        assert_eq!(results[0].bm25_score, 1.0);
        for r in &results {
            assert!(r.bm25_score > 0.0 && r.bm25_score <= 1.0);
        }
    }

    #[test]
    fn test_search_is_deterministic() {
        let index = build(clinic_corpus());
        let first = index.search("joint pain treatment", 3, None).unwrap();
        let second = index.search("joint pain treatment", 3, None).unwrap();

        let ids: Vec<_> = first.iter().map(|r| (&r.chunk_id, r.bm25_score)).collect();
        let ids2: Vec<_> = second.iter().map(|r| (&r.chunk_id, r.bm25_score)).collect();
        assert_eq!(ids, ids2);
    }

    #[test]
    fn test_term_frequency_monotonicity() {
        // Same length, same category; higher frequency of the query term
        // must not score lower.
        let corpus = vec![
            item("low", "massage relaxes tired aching muscles deeply", "angebote"),
            item("high", "massage massage massage relaxes tired muscles", "angebote"),
        ];
        let index = build(corpus);
        let results = index.search("massage", 2, None).unwrap();
        assert_eq!(results[0].chunk_id, "high");
        assert!(results[0].bm25_score >= results[1].bm25_score);
    }

    #[test]
    fn test_category_filter() {
        let index = build(clinic_corpus());
        let filter = FilterSpec {
            category: Some(vec!["praxis-info".to_string()]),
            ..Default::default()
        };
        let results = index.search("clinic open monday", 5, Some(&filter)).unwrap();
        assert!(!results.is_empty());
        for r in &results {
            assert_eq!(r.metadata.category, "praxis-info");
        }
    }

    #[test]
    fn test_filter_excludes_before_ranking() {
        let index = build(clinic_corpus());
        let filter = FilterSpec {
            category: Some(vec!["praxis-info".to_string()]),
            ..Default::default()
        };
        // "joint pain" only matches the filtered-out d1.
        let results = index.search("joint pain", 5, Some(&filter)).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_no_overlap_returns_empty() {
        let index = build(clinic_corpus());
        let results = index.search("quantum chromodynamics", 5, None).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_query_of_stop_tokens_returns_empty() {
        let index = build(clinic_corpus());
        // Every token is <= 2 chars or digits-only.
        let results = index.search("is to 42", 5, None).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_empty_index_is_unavailable() {
        let index = build(Vec::new());
        let err = index.search("anything", 5, None).unwrap_err();
        assert!(matches!(err, ArnikaError::IndexUnavailable(_)));
    }

    #[test]
    fn test_truncates_to_k() {
        let index = build(clinic_corpus());
        let results = index.search("pain injury clinic", 1, None).unwrap();
        assert!(results.len() <= 1);
    }

    #[test]
    fn test_idf_is_non_negative() {
        // A term occurring in every document would go negative under the
        // plain BM25 idf; the +1 variant keeps it above zero.
        let corpus = vec![
            item("a", "physiotherapy for everyone here", "angebote"),
            item("b", "physiotherapy helps recovery quickly", "angebote"),
        ];
        let index = build(corpus);
        let results = index.search("physiotherapy", 2, None).unwrap();
        assert_eq!(results.len(), 2);
        for r in &results {
            assert!(r.bm25_score > 0.0);
        }
    }
}
