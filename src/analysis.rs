//! Text analysis for keyword indexing and search.
//!
//! One tokenization strategy is shared by the index build path and the
//! query path so that corpus statistics and query tokens always agree.
//! The rules are tuned for a multilingual (German/English/French) medical
//! corpus: hyphenated compound terms such as `colon-hydro-therapie` stay
//! intact, while short noise tokens and bare numbers are dropped.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Everything that is not a word character, whitespace, or hyphen
    /// becomes a separator. Word characters include letters with
    /// diacritics, so umlauts and accents survive.
    static ref NON_TOKEN: Regex = Regex::new(r"[^\w\s-]").unwrap();
}

/// Tokenize text for BM25 indexing and scoring.
///
/// Rules, applied in order:
/// - lowercase the input,
/// - replace everything except word characters, whitespace, and hyphens
///   with spaces, then split on whitespace,
/// - drop tokens of length <= 2 and tokens consisting only of digits.
///
/// # Examples
///
/// ```
/// use arnika::analysis::tokenize;
///
/// let tokens = tokenize("Colon-Hydro-Therapie kostet 120 CHF.");
/// assert_eq!(tokens, vec!["colon-hydro-therapie", "kostet", "chf"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = NON_TOKEN.replace_all(&lowered, " ");

    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() > 2 && !t.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_splits() {
        let tokens = tokenize("Osteopathy Treats Joint Pain");
        assert_eq!(tokens, vec!["osteopathy", "treats", "joint", "pain"]);
    }

    #[test]
    fn test_keeps_internal_hyphens() {
        let tokens = tokenize("Die Colon-Hydro-Therapie hilft");
        assert!(tokens.contains(&"colon-hydro-therapie".to_string()));
    }

    #[test]
    fn test_drops_short_tokens() {
        // "it", "is", "to", "be", "a" are all <= 2 chars
        let tokens = tokenize("it is to be a word");
        assert_eq!(tokens, vec!["word"]);
    }

    #[test]
    fn test_drops_digit_only_tokens() {
        let tokens = tokenize("Termine 2024 unter 0443551234 buchen");
        assert_eq!(tokens, vec!["termine", "unter", "buchen"]);
    }

    #[test]
    fn test_keeps_diacritics() {
        let tokens = tokenize("Ernährung für Rückenschmerzen");
        assert_eq!(tokens, vec!["ernährung", "für", "rückenschmerzen"]);
    }

    #[test]
    fn test_apostrophes_separate() {
        // Elided French articles split off and fall below the length cutoff.
        let tokens = tokenize("Qu'est-ce que l'ostéopathie");
        assert!(tokens.contains(&"ostéopathie".to_string()));
        assert!(!tokens.iter().any(|t| t.contains('\'')));
    }

    #[test]
    fn test_punctuation_separates() {
        let tokens = tokenize("pain,mobility;issues");
        assert_eq!(tokens, vec!["pain", "mobility", "issues"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  !!  ").is_empty());
    }
}
