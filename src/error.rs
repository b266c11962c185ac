//! Error types for the Arnika retrieval pipeline.
//!
//! All fallible operations in this crate return [`Result`], whose error type
//! is the closed [`ArnikaError`] enum. Each call site decides explicitly
//! whether a given kind is retried, degraded, or fatal; the
//! [`ArnikaError::is_transient`] predicate marks the kinds that a bounded
//! retry-with-backoff is allowed to attempt again.

use std::io;

use anyhow;
use thiserror::Error;

/// The main error type for retrieval operations.
#[derive(Error, Debug)]
pub enum ArnikaError {
    /// I/O errors (file operations, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The raw query was empty or all-whitespace. Never retried.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A query vector's length does not match the configured vector size.
    /// Treated as a configuration/integrity defect, never retried.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The keyword index is absent or empty. Callers degrade to
    /// semantic-only search instead of surfacing this to the user.
    #[error("Keyword index unavailable: {0}")]
    IndexUnavailable(String),

    /// The embedding capability failed. Fatal for the request once the
    /// retry budget is exhausted: without a query vector there are no
    /// results to return.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// The cross-encoder scoring capability failed. Never fatal: the
    /// re-ranker falls back to the candidates' incoming order.
    #[error("Cross-encoder scorer unavailable: {0}")]
    Scorer(String),

    /// Corpus validation errors (duplicate chunk ids, empty texts).
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// Index artifact persistence errors (framing, checksum, codec).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration detected at construction time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller cancelled the request between pipeline stages.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with [`ArnikaError`].
pub type Result<T> = std::result::Result<T, ArnikaError>;

impl ArnikaError {
    /// Create a new invalid-query error.
    pub fn invalid_query<S: Into<String>>(msg: S) -> Self {
        ArnikaError::InvalidQuery(msg.into())
    }

    /// Create a new index-unavailable error.
    pub fn index_unavailable<S: Into<String>>(msg: S) -> Self {
        ArnikaError::IndexUnavailable(msg.into())
    }

    /// Create a new embedding error.
    pub fn embedding<S: Into<String>>(msg: S) -> Self {
        ArnikaError::Embedding(msg.into())
    }

    /// Create a new scorer error.
    pub fn scorer<S: Into<String>>(msg: S) -> Self {
        ArnikaError::Scorer(msg.into())
    }

    /// Create a new corpus error.
    pub fn corpus<S: Into<String>>(msg: S) -> Self {
        ArnikaError::Corpus(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        ArnikaError::Storage(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        ArnikaError::Config(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        ArnikaError::Cancelled(msg.into())
    }

    /// Whether a bounded retry with backoff is allowed for this kind.
    ///
    /// Only failures of external capabilities (embedding, cross-encoder)
    /// and raw I/O qualify. Input validation and integrity defects are
    /// never retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ArnikaError::Io(_) | ArnikaError::Embedding(_) | ArnikaError::Scorer(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = ArnikaError::invalid_query("empty query");
        assert_eq!(error.to_string(), "Invalid query: empty query");

        let error = ArnikaError::index_unavailable("no index installed");
        assert_eq!(
            error.to_string(),
            "Keyword index unavailable: no index installed"
        );

        let error = ArnikaError::DimensionMismatch {
            expected: 1024,
            actual: 768,
        };
        assert_eq!(
            error.to_string(),
            "Dimension mismatch: expected 1024, got 768"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error = ArnikaError::from(io_error);

        match error {
            ArnikaError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(ArnikaError::embedding("timeout").is_transient());
        assert!(ArnikaError::scorer("connection reset").is_transient());
        assert!(!ArnikaError::invalid_query("empty").is_transient());
        assert!(
            !ArnikaError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
            .is_transient()
        );
        assert!(!ArnikaError::cancelled("client gone").is_transient());
    }
}
