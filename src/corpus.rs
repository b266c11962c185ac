//! Corpus records and metadata filters.
//!
//! The document chunker upstream produces [`CorpusItem`] records; this crate
//! consumes them read-only. Validation happens once, at the ingestion
//! boundary ([`validate_corpus`]), so downstream components never re-check
//! individual fields.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{ArnikaError, Result};

/// Metadata attached to one indexed passage of a source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Document the chunk was extracted from.
    pub source_document: String,
    /// Content category (e.g. `angebote`, `therapien`, `praxis-info`).
    pub category: String,
    /// Language of the chunk, if known.
    pub language: Option<String>,
    /// Source medium of the document (e.g. `pdf`, `text`).
    pub source_type: String,
    /// Position of this chunk within its document.
    pub chunk_index: usize,
    /// Total number of chunks the document was split into.
    pub total_chunks: usize,
}

/// One indexed passage of a source document.
///
/// Invariants (enforced by [`validate_corpus`]): `chunk_id` is globally
/// unique across the corpus (convention `<document>#<index>`), and `text`
/// is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusItem {
    /// Globally unique chunk identifier.
    pub chunk_id: String,
    /// The passage text.
    pub text: String,
    /// Chunk metadata.
    pub metadata: ChunkMetadata,
}

impl CorpusItem {
    /// Create a new corpus item.
    pub fn new(
        chunk_id: impl Into<String>,
        text: impl Into<String>,
        metadata: ChunkMetadata,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            text: text.into(),
            metadata,
        }
    }
}

/// Validate a corpus snapshot before indexing.
///
/// Checks the two invariants the keyword index build relies on: every
/// `text` is non-empty (after trimming) and every `chunk_id` is unique.
///
/// # Errors
///
/// Returns [`ArnikaError::Corpus`] naming the first offending chunk.
pub fn validate_corpus(items: &[CorpusItem]) -> Result<()> {
    let mut seen: AHashSet<&str> = AHashSet::with_capacity(items.len());
    for item in items {
        if item.text.trim().is_empty() {
            return Err(ArnikaError::corpus(format!(
                "chunk '{}' has empty text",
                item.chunk_id
            )));
        }
        if !seen.insert(item.chunk_id.as_str()) {
            return Err(ArnikaError::corpus(format!(
                "duplicate chunk id '{}'",
                item.chunk_id
            )));
        }
    }
    Ok(())
}

/// Metadata filter applied during search.
///
/// Provided fields combine with AND; the `category` field matches when the
/// item's category is any member of the set (OR). A field that is absent
/// from a chunk's metadata never excludes that chunk: missing is not a
/// mismatch. The external vector search capability must honor the same
/// semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Match any of these categories.
    pub category: Option<Vec<String>>,
    /// Match this language exactly.
    pub language: Option<String>,
    /// Match this source type exactly.
    pub source_type: Option<String>,
}

impl FilterSpec {
    /// A filter that matches everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.language.is_none() && self.source_type.is_none()
    }

    /// Whether the given chunk metadata passes this filter.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        if let Some(categories) = &self.category
            && !categories.iter().any(|c| c == &metadata.category)
        {
            return false;
        }
        if let Some(language) = &self.language {
            // A chunk without a language tag is never excluded.
            if let Some(chunk_language) = &metadata.language
                && chunk_language != language
            {
                return false;
            }
        }
        if let Some(source_type) = &self.source_type
            && source_type != &metadata.source_type
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, text: &str) -> CorpusItem {
        CorpusItem::new(id, text, ChunkMetadata::default())
    }

    fn metadata(category: &str, language: Option<&str>, source_type: &str) -> ChunkMetadata {
        ChunkMetadata {
            source_document: "doc.md".to_string(),
            category: category.to_string(),
            language: language.map(String::from),
            source_type: source_type.to_string(),
            chunk_index: 0,
            total_chunks: 1,
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_corpus() {
        let corpus = vec![item("a#0", "first"), item("a#1", "second")];
        assert!(validate_corpus(&corpus).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_text() {
        let corpus = vec![item("a#0", "   ")];
        let err = validate_corpus(&corpus).unwrap_err();
        assert!(matches!(err, ArnikaError::Corpus(_)));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let corpus = vec![item("a#0", "first"), item("a#0", "second")];
        let err = validate_corpus(&corpus).unwrap_err();
        assert!(err.to_string().contains("duplicate chunk id"));
    }

    #[test]
    fn test_filter_category_or_semantics() {
        let filter = FilterSpec {
            category: Some(vec!["angebote".to_string(), "therapien".to_string()]),
            ..Default::default()
        };
        assert!(filter.matches(&metadata("angebote", None, "text")));
        assert!(filter.matches(&metadata("therapien", None, "text")));
        assert!(!filter.matches(&metadata("praxis-info", None, "text")));
    }

    #[test]
    fn test_filter_fields_combine_with_and() {
        let filter = FilterSpec {
            category: Some(vec!["angebote".to_string()]),
            language: Some("DE".to_string()),
            source_type: None,
        };
        assert!(filter.matches(&metadata("angebote", Some("DE"), "text")));
        assert!(!filter.matches(&metadata("angebote", Some("EN"), "text")));
        assert!(!filter.matches(&metadata("therapien", Some("DE"), "text")));
    }

    #[test]
    fn test_missing_language_never_excludes() {
        let filter = FilterSpec {
            language: Some("DE".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&metadata("angebote", None, "text")));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = FilterSpec::none();
        assert!(filter.is_empty());
        assert!(filter.matches(&metadata("angebote", Some("DE"), "pdf")));
    }
}
