//! Utterance Normalizer
//!
//! Cleans raw text and decides which display language responses should use.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref REPEATED_SEPARATORS: Regex = Regex::new(r"\s*([,;:!?।.])(?:\s*[,;:!?।.])*").unwrap();
    static ref DASH_RUNS: Regex = Regex::new(r"\s*(?:-{2,}|—|–)\s*").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Display language of the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Bn,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Bn => "bn",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" | "en-us" | "en-gb" | "english" => Some(Language::En),
            "bn" | "bn-bd" | "bn-in" | "bangla" | "bengali" => Some(Language::Bn),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A normalized utterance. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Utterance {
    text: String,
    language: Language,
}

impl Utterance {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

pub fn is_bengali(c: char) -> bool {
    ('\u{0980}'..='\u{09FF}').contains(&c)
}

/// Normalize raw text. Never fails.
pub fn normalize(raw: &str, hint: Option<Language>, default: Language) -> Utterance {
    let folded = fold_bengali_digits(raw);
    let collapsed = REPEATED_SEPARATORS.replace_all(&folded, "$1");
    let dashed = DASH_RUNS.replace_all(&collapsed, " - ");
    let spaced = WHITESPACE.replace_all(&dashed, " ");
    let text = spaced
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'))
        .to_string();

    let language = detect_language(&text).or(hint).unwrap_or(default);
    Utterance { text, language }
}

/// Script-based language signal; `None` when neither script dominates
pub fn detect_language(text: &str) -> Option<Language> {
    let mut bengali_words = 0usize;
    let mut latin_words = 0usize;
    for word in text.split_whitespace() {
        if word.chars().any(is_bengali) {
            bengali_words += 1;
        } else if word.chars().any(|c| c.is_ascii_alphabetic()) {
            latin_words += 1;
        }
    }

    if bengali_words > latin_words {
        Some(Language::Bn)
    } else if latin_words > bengali_words {
        Some(Language::En)
    } else {
        None
    }
}

fn fold_bengali_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{09E6}'..='\u{09EF}' => {
                let offset = c as u32 - 0x09E6;
                char::from_digit(offset, 10).unwrap_or(c)
            }
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_collapses() {
        let u = normalize("   show   sales ,, for  Setu!!!   ", None, Language::En);
        assert_eq!(u.text(), "show sales, for Setu!");
        assert_eq!(u.language(), Language::En);
    }

    #[test]
    fn test_keeps_decimal_points() {
        let u = normalize("alert when margin drops below 2.5%", None, Language::En);
        assert_eq!(u.text(), "alert when margin drops below 2.5%");
    }

    #[test]
    fn test_detects_bengali() {
        let u = normalize("Setu Filling Station এর গত সপ্তাহের বিক্রি দেখাও", None, Language::En);
        assert_eq!(u.language(), Language::Bn);
    }

    #[test]
    fn test_folds_bengali_digits() {
        let u = normalize("৫০০ এর নিচে", None, Language::En);
        assert_eq!(u.text(), "500 এর নিচে");
    }

    #[test]
    fn test_hint_then_default_when_undetectable() {
        assert_eq!(normalize("2024-01-01", Some(Language::Bn), Language::En).language(), Language::Bn);
        assert_eq!(normalize("   ", None, Language::Bn).language(), Language::Bn);
        assert!(normalize("   ", None, Language::En).is_empty());
    }

    #[test]
    fn test_script_signal_beats_hint() {
        let u = normalize("show fuel stock", Some(Language::Bn), Language::En);
        assert_eq!(u.language(), Language::En);
    }
}
