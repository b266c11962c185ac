//! Fusion of keyword and semantic candidate lists.
//!
//! Both strategies merge on `chunk_id`: a chunk present in only one list
//! contributes nothing for the missing channel. Callers are expected to
//! over-fetch (each source list should hold at least twice the final
//! requested count) so one ranking's noise cannot cost recall.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::search::SearchCandidate;

/// Strategy for combining keyword and semantic rankings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Weighted score fusion:
    /// `final = alpha * semantic + (1 - alpha) * bm25`.
    ///
    /// With both inputs in `[0, 1]` and `alpha` in `[0, 1]`, every fused
    /// score stays in `[0, 1]`.
    Weighted {
        /// Weight of the semantic channel, in `[0, 1]`.
        alpha: f32,
    },
    /// Reciprocal rank fusion: `final = sum over source lists of
    /// 1 / (k + rank)` with 1-based ranks. Ignores score magnitudes; a
    /// chunk ranked first in both lists beats one ranked first in only
    /// one.
    ReciprocalRank {
        /// The RRF dampening constant.
        k: f32,
    },
}

impl Default for FusionStrategy {
    /// Weighted fusion, semantic-leaning (`alpha = 0.7`).
    fn default() -> Self {
        FusionStrategy::Weighted { alpha: 0.7 }
    }
}

/// The conventional RRF constant.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Merge keyword and semantic candidate lists into one ranking.
///
/// The output contains exactly the union of both input lists' chunk ids,
/// fully ordered descending by fused score. The sort is stable, so ties
/// keep the keyword list's order followed by semantic-only entries.
pub fn fuse(
    bm25: &[SearchCandidate],
    semantic: &[SearchCandidate],
    strategy: &FusionStrategy,
) -> Vec<SearchCandidate> {
    // Insertion-ordered merge table keyed by chunk_id.
    let mut merged: Vec<SearchCandidate> = Vec::with_capacity(bm25.len() + semantic.len());
    let mut by_id: AHashMap<&str, usize> = AHashMap::with_capacity(bm25.len() + semantic.len());

    for candidate in bm25 {
        let mut entry = candidate.clone();
        entry.semantic_score = 0.0;
        by_id.insert(&candidate.chunk_id, merged.len());
        merged.push(entry);
    }
    for candidate in semantic {
        match by_id.get(candidate.chunk_id.as_str()) {
            Some(&idx) => merged[idx].semantic_score = candidate.semantic_score,
            None => {
                let mut entry = candidate.clone();
                entry.bm25_score = 0.0;
                merged.push(entry);
            }
        }
    }

    match strategy {
        FusionStrategy::Weighted { alpha } => {
            for entry in &mut merged {
                entry.score = alpha * entry.semantic_score + (1.0 - alpha) * entry.bm25_score;
            }
        }
        FusionStrategy::ReciprocalRank { k } => {
            let mut rrf: AHashMap<&str, f32> = AHashMap::with_capacity(merged.len());
            for (rank, candidate) in bm25.iter().enumerate() {
                *rrf.entry(candidate.chunk_id.as_str()).or_insert(0.0) +=
                    1.0 / (k + (rank + 1) as f32);
            }
            for (rank, candidate) in semantic.iter().enumerate() {
                *rrf.entry(candidate.chunk_id.as_str()).or_insert(0.0) +=
                    1.0 / (k + (rank + 1) as f32);
            }
            for entry in &mut merged {
                entry.score = rrf.get(entry.chunk_id.as_str()).copied().unwrap_or(0.0);
            }
        }
    }

    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged
}
