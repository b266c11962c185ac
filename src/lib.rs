//! # Arnika
//!
//! Hybrid retrieval and re-ranking pipeline for a medical practice
//! assistant backend.
//!
//! ## Features
//!
//! - Query normalization with German/English/French detection
//! - In-memory BM25 keyword index with a persisted, checksummed artifact
//! - Weighted and reciprocal-rank fusion of keyword and semantic results
//! - Cross-encoder re-ranking with graceful degradation
//! - One async [`engine::RetrievalEngine::retrieve`] operation tying it
//!   all together, with filters, thresholds, and per-stage timings
//!
//! The embedding model, the vector similarity index, and the cross-encoder
//! are external capabilities injected as trait objects; see
//! [`embedding::TextEmbedder`], [`vector::VectorSearcher`], and
//! [`rerank::CrossScorer`].

pub mod analysis;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod keyword;
pub mod query;
pub mod rerank;
pub mod search;
pub mod vector;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
