//! Query normalization and language detection.
//!
//! Raw user queries arrive with uneven whitespace, stray punctuation, and
//! no language tag. [`QueryNormalizer`] cleans them into a canonical form
//! suitable for embedding and keyword search, and tags the likely language
//! so the orchestrator can default a language filter when the caller did
//! not provide one.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ArnikaError, Result};

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref PUNCT_RUN: Regex = Regex::new(r"([?.!,;:]){2,}").unwrap();
    static ref LEADING_PUNCT: Regex = Regex::new(r"^[.,;:!]+").unwrap();
    static ref TRAILING_PUNCT: Regex = Regex::new(r"[.,;:!]+$").unwrap();
    static ref WORD: Regex = Regex::new(r"\b\w+\b").unwrap();
    static ref GERMAN_DIACRITICS: Regex = Regex::new(r"[äöüÄÖÜß]").unwrap();
    static ref FRENCH_DIACRITICS: Regex =
        Regex::new(r"[àâéèêëïîôùûÿçÀÂÉÈÊËÏÎÔÙÛŸÇ]").unwrap();

    /// German function and domain words used for language detection.
    static ref GERMAN_INDICATORS: HashSet<&'static str> = [
        "der", "die", "das", "und", "ist", "von", "für", "mit", "auf",
        "eine", "einem", "einen", "welche", "welcher", "welches",
        "funktioniert", "bietet", "kostet", "können", "möchte",
    ]
    .into_iter()
    .collect();

    /// English indicator words.
    static ref ENGLISH_INDICATORS: HashSet<&'static str> = [
        "the", "and", "is", "for", "with", "what", "how", "can", "does",
        "which", "where", "when", "why", "offer", "cost", "provide",
    ]
    .into_iter()
    .collect();

    /// French indicator words.
    static ref FRENCH_INDICATORS: HashSet<&'static str> = [
        "le", "la", "les", "un", "une", "des", "et", "est", "de", "pour",
        "avec", "que", "qui", "quoi", "comment", "quand", "où", "pourquoi",
        "offre", "coût", "fournir", "quel", "quelle",
    ]
    .into_iter()
    .collect();
}

/// Language detected in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Language {
    /// German.
    #[serde(rename = "DE")]
    De,
    /// English.
    #[serde(rename = "EN")]
    En,
    /// French.
    #[serde(rename = "FR")]
    Fr,
    /// Detection was inconclusive.
    #[serde(rename = "unknown")]
    #[default]
    Unknown,
}

impl Language {
    /// The language code used in chunk metadata and filters, or `None`
    /// when detection was inconclusive.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Language::De => Some("DE"),
            Language::En => Some("EN"),
            Language::Fr => Some("FR"),
            Language::Unknown => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code().unwrap_or("unknown"))
    }
}

/// Result of query normalization.
///
/// Created per request and discarded after it; carries everything the
/// orchestrator needs to resolve filters and build the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedQuery {
    /// The raw query as received.
    pub original: String,
    /// The cleaned query text.
    pub normalized: String,
    /// Detected language.
    pub detected_language: Language,
    /// Character count of the normalized text.
    pub char_count: usize,
    /// Whether normalization changed the text beyond trimming.
    pub was_modified: bool,
}

/// Normalizes and language-tags raw user queries.
///
/// # Examples
///
/// ```
/// use arnika::query::{Language, QueryNormalizer};
///
/// let normalizer = QueryNormalizer::new(512);
/// let query = normalizer.normalize("  Welche   Therapien bietet ihr an???  ").unwrap();
/// assert_eq!(query.normalized, "Welche Therapien bietet ihr an?");
/// assert_eq!(query.detected_language, Language::De);
/// assert!(query.was_modified);
/// ```
#[derive(Debug, Clone)]
pub struct QueryNormalizer {
    max_length: usize,
}

impl QueryNormalizer {
    /// Create a normalizer with the given maximum query length in
    /// characters.
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Normalize a raw query.
    ///
    /// Collapses whitespace runs, collapses runs of repeated punctuation,
    /// strips leading/trailing punctuation (question marks survive),
    /// detects the language, and hard-truncates over-length input.
    ///
    /// # Errors
    ///
    /// Returns [`ArnikaError::InvalidQuery`] when the input is empty or
    /// all-whitespace.
    pub fn normalize(&self, raw: &str) -> Result<NormalizedQuery> {
        if raw.trim().is_empty() {
            return Err(ArnikaError::invalid_query("query cannot be empty"));
        }

        let mut normalized = WHITESPACE_RUN.replace_all(raw, " ").trim().to_string();
        normalized = PUNCT_RUN.replace_all(&normalized, "$1").into_owned();
        normalized = LEADING_PUNCT.replace(&normalized, "").into_owned();
        normalized = TRAILING_PUNCT.replace(&normalized, "").into_owned();
        normalized = normalized.trim().to_string();

        let detected_language = detect_language(&normalized);

        if normalized.chars().count() > self.max_length {
            tracing::warn!(
                chars = normalized.chars().count(),
                max = self.max_length,
                "query too long, truncating"
            );
            normalized = normalized.chars().take(self.max_length).collect();
            // The cut can land on punctuation; strip again so truncated
            // queries normalize to a fixpoint like any other.
            normalized = TRAILING_PUNCT.replace(&normalized, "").into_owned();
            normalized = normalized.trim().to_string();
        }

        let was_modified = normalized != raw.trim();

        Ok(NormalizedQuery {
            original: raw.to_string(),
            char_count: normalized.chars().count(),
            normalized,
            detected_language,
            was_modified,
        })
    }
}

impl Default for QueryNormalizer {
    fn default() -> Self {
        Self::new(512)
    }
}

/// Detect the query language from indicator-word overlap.
///
/// The language whose indicator set has the strictly largest intersection
/// with the query's token set wins. On a zero or tied count, language
/// specific diacritics decide (umlauts/ß are a strong German signal,
/// accented letters a French one); otherwise the result is
/// [`Language::Unknown`].
fn detect_language(text: &str) -> Language {
    let lowered = text.to_lowercase();
    let words: HashSet<&str> = WORD.find_iter(&lowered).map(|m| m.as_str()).collect();

    let german = words.intersection(&GERMAN_INDICATORS).count();
    let english = words.intersection(&ENGLISH_INDICATORS).count();
    let french = words.intersection(&FRENCH_INDICATORS).count();

    let max = german.max(english).max(french);
    let strict_winner = if max == 0 {
        None
    } else if german == max && english < max && french < max {
        Some(Language::De)
    } else if english == max && german < max && french < max {
        Some(Language::En)
    } else if french == max && german < max && english < max {
        Some(Language::Fr)
    } else {
        None
    };

    if let Some(language) = strict_winner {
        return language;
    }

    if GERMAN_DIACRITICS.is_match(text) {
        Language::De
    } else if FRENCH_DIACRITICS.is_match(text) {
        Language::Fr
    } else {
        Language::Unknown
    }
}
