use crate::normalizer::is_bengali;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use strsim::{levenshtein, normalized_levenshtein};

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// How a mention matched a registry term, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Synonym,
    Partial,
    Fuzzy,
}

pub const EXACT_SCORE: f64 = 1.0;
pub const SYNONYM_SCORE: f64 = 0.95;

/// Partial and fuzzy inputs shorter than this never match
const MIN_LOOSE_LEN: usize = 3;

/// Normalize a term for matching
/// - Converts to lowercase
/// - Treats `_`, `-` and `/` as word separators
/// - Removes other punctuation
/// - Normalizes whitespace
pub fn normalize_term(s: &str) -> String {
    let lowered: String = s
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '_' | '-' | '/') { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || is_bengali(*c))
        .collect();

    WHITESPACE.replace_all(&lowered, " ").trim().to_string()
}

/// Loose matcher for the partial and fuzzy stages of a lookup
#[derive(Debug, Clone)]
pub struct TermMatcher {
    /// Largest edit distance accepted by the fuzzy stage
    pub max_distance: usize,
}

impl Default for TermMatcher {
    fn default() -> Self {
        Self { max_distance: 2 }
    }
}

impl TermMatcher {
    pub fn new(max_distance: usize) -> Self {
        Self { max_distance }
    }

    /// Containment on word boundaries, either direction.
    /// Scores fall in (0.5, 0.9], higher when the lengths are closer.
    pub fn partial_score(&self, input: &str, term: &str) -> Option<f64> {
        if input.chars().count() < MIN_LOOSE_LEN || input == term {
            return None;
        }

        let contained = contains_words(term, input) || contains_words(input, term);
        if !contained {
            return None;
        }

        let a = input.chars().count() as f64;
        let b = term.chars().count() as f64;
        let ratio = a.min(b) / a.max(b);
        Some(0.5 + 0.4 * ratio)
    }

    /// Edit-distance match. Scores stay at or below 0.5 so a fuzzy hit never
    /// outranks a containment hit.
    pub fn fuzzy_score(&self, input: &str, term: &str) -> Option<f64> {
        let len = input.chars().count();
        if len < MIN_LOOSE_LEN {
            return None;
        }

        // Short words tolerate fewer edits
        let allowed = self.max_distance.min((len / 4).max(1));
        let distance = levenshtein(input, term);
        if distance == 0 || distance > allowed {
            return None;
        }

        Some(0.5 * normalized_levenshtein(input, term))
    }
}

fn contains_words(haystack: &str, needle: &str) -> bool {
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}
