//! Intent Classifier
//!
//! Closed three-way decision between data retrieval, dashboard configuration
//! and alert management. Implementations sit behind `IntentClassifier` so the
//! rule-based lexicon and a provider-backed model share one timeout contract.

use crate::entities::Vocabulary;
use crate::error::Result;
use crate::normalizer::Utterance;
use crate::taxonomy::matcher::normalize_term;
use crate::taxonomy::TaxonomySnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    DataRetrieval,
    DashboardConfig,
    AlertManagement,
}

impl Vocabulary for Intent {
    const ALL: &'static [Self] = &[Intent::DataRetrieval, Intent::DashboardConfig, Intent::AlertManagement];

    fn key(&self) -> &'static str {
        match self {
            Intent::DataRetrieval => "data_retrieval",
            Intent::DashboardConfig => "dashboard_config",
            Intent::AlertManagement => "alert_management",
        }
    }
}

/// A score in [0, 1]. Cannot be built out of range or from a non-finite value.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    pub const ZERO: Confidence = Confidence(0.0);

    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_reliable(&self, threshold: f64) -> bool {
        self.0 >= threshold
    }
}

/// Classifier output before contract validation; providers may return anything
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f64,
}

impl Classification {
    /// Best guess used when the classifier produced nothing usable
    pub fn fallback() -> Self {
        Self {
            intent: Intent::default(),
            confidence: 0.0,
        }
    }
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify(&self, utterance: &Utterance, snapshot: &TaxonomySnapshot) -> Result<Classification>;
}

/// Cue word or phrase with its weight toward one intent
struct Cue {
    text: &'static str,
    intent: Intent,
    weight: f64,
}

const fn cue(text: &'static str, intent: Intent, weight: f64) -> Cue {
    Cue { text, intent, weight }
}

const CUES: &[Cue] = &[
    // data retrieval
    cue("show", Intent::DataRetrieval, 1.5),
    cue("what", Intent::DataRetrieval, 1.5),
    cue("how much", Intent::DataRetrieval, 1.5),
    cue("how many", Intent::DataRetrieval, 1.5),
    cue("list", Intent::DataRetrieval, 1.5),
    cue("fetch", Intent::DataRetrieval, 1.5),
    cue("get", Intent::DataRetrieval, 1.0),
    cue("give", Intent::DataRetrieval, 1.0),
    cue("tell", Intent::DataRetrieval, 1.0),
    cue("total", Intent::DataRetrieval, 1.0),
    cue("report", Intent::DataRetrieval, 1.0),
    cue("দেখাও", Intent::DataRetrieval, 1.5),
    cue("দেখান", Intent::DataRetrieval, 1.5),
    cue("কত", Intent::DataRetrieval, 1.5),
    cue("দাও", Intent::DataRetrieval, 1.0),
    // dashboard configuration
    cue("dashboard", Intent::DashboardConfig, 3.0),
    cue("chart", Intent::DashboardConfig, 2.5),
    cue("graph", Intent::DashboardConfig, 2.5),
    cue("plot", Intent::DashboardConfig, 2.5),
    cue("visualize", Intent::DashboardConfig, 2.5),
    cue("visualise", Intent::DashboardConfig, 2.5),
    cue("widget", Intent::DashboardConfig, 2.5),
    cue("pin", Intent::DashboardConfig, 1.5),
    cue("kpi", Intent::DashboardConfig, 1.5),
    cue("bar", Intent::DashboardConfig, 1.5),
    cue("line", Intent::DashboardConfig, 1.0),
    cue("area", Intent::DashboardConfig, 1.0),
    cue("table", Intent::DashboardConfig, 1.0),
    cue("ড্যাশবোর্ড", Intent::DashboardConfig, 3.0),
    cue("চার্ট", Intent::DashboardConfig, 2.5),
    cue("গ্রাফ", Intent::DashboardConfig, 2.5),
    cue("টেবিল", Intent::DashboardConfig, 1.0),
    // alert management
    cue("alert", Intent::AlertManagement, 3.0),
    cue("notify", Intent::AlertManagement, 3.0),
    cue("notification", Intent::AlertManagement, 2.5),
    cue("alarm", Intent::AlertManagement, 2.5),
    cue("warn", Intent::AlertManagement, 2.0),
    cue("remind", Intent::AlertManagement, 2.0),
    cue("threshold", Intent::AlertManagement, 2.0),
    cue("let me know", Intent::AlertManagement, 2.0),
    cue("when", Intent::AlertManagement, 1.0),
    cue("whenever", Intent::AlertManagement, 1.5),
    cue("সতর্ক", Intent::AlertManagement, 3.0),
    cue("অ্যালার্ট", Intent::AlertManagement, 3.0),
    cue("এলার্ট", Intent::AlertManagement, 3.0),
    cue("জানাও", Intent::AlertManagement, 2.0),
    cue("জানিও", Intent::AlertManagement, 2.0),
    cue("যখন", Intent::AlertManagement, 1.0),
];

/// Confidence when no cue fires at all
const NO_SIGNAL: f64 = 0.3;
/// Same, but the utterance names something in the registry
const NO_SIGNAL_WITH_HINT: f64 = 0.5;
/// Confidence when two intents score the same
const TIED: f64 = 0.45;
const HINT_BONUS: f64 = 0.05;
const CEILING: f64 = 0.98;

/// Weighted cue lexicon classifier (English and Bengali)
#[derive(Debug, Clone, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Pure scoring step, shared by the trait impl and tests
    pub fn score(&self, utterance: &Utterance, snapshot: &TaxonomySnapshot) -> Classification {
        let text = normalize_term(utterance.text());
        let words: Vec<&str> = text.split(' ').filter(|w| !w.is_empty()).collect();
        let padded = format!(" {} ", text);

        let mut scores = [0.0f64; 3];
        for c in CUES {
            if cue_matches(c.text, &words, &padded) {
                scores[slot(c.intent)] += c.weight;
            }
        }

        let hint = mentions_registry_term(&padded, snapshot);
        let (intent, confidence) = decide(scores, hint);

        debug!(
            "Intent scores retrieval={:.1} dashboard={:.1} alert={:.1} hint={} -> {} ({:.3})",
            scores[0],
            scores[1],
            scores[2],
            hint,
            intent.key(),
            confidence
        );

        Classification { intent, confidence }
    }
}

#[async_trait]
impl IntentClassifier for RuleBasedClassifier {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn classify(&self, utterance: &Utterance, snapshot: &TaxonomySnapshot) -> Result<Classification> {
        Ok(self.score(utterance, snapshot))
    }
}

fn slot(intent: Intent) -> usize {
    match intent {
        Intent::DataRetrieval => 0,
        Intent::DashboardConfig => 1,
        Intent::AlertManagement => 2,
    }
}

/// Multi-word cues match as phrases; single words match whole words, or as a
/// prefix for longer cues so inflections ("alerts", "সতর্কতা") still count
fn cue_matches(cue: &str, words: &[&str], padded: &str) -> bool {
    if cue.contains(' ') {
        return padded.contains(&format!(" {} ", cue));
    }
    if cue.chars().count() >= 4 {
        words.iter().any(|w| w.starts_with(cue))
    } else {
        words.iter().any(|w| *w == cue)
    }
}

fn mentions_registry_term(padded: &str, snapshot: &TaxonomySnapshot) -> bool {
    snapshot
        .surface_forms()
        .iter()
        .any(|(form, _)| padded.contains(&format!(" {} ", form)))
}

fn decide(scores: [f64; 3], hint: bool) -> (Intent, f64) {
    let mut ranked: Vec<(Intent, f64)> = Intent::ALL.iter().map(|i| (*i, scores[slot(*i)])).collect();
    // Stable sort keeps the fixed intent order among equal scores
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (top_intent, top) = ranked[0];
    let second = ranked[1].1;

    if top <= 0.0 {
        let confidence = if hint { NO_SIGNAL_WITH_HINT } else { NO_SIGNAL };
        return (Intent::DataRetrieval, confidence);
    }

    if (top - second).abs() < 1e-9 {
        let tied_retrieval = ranked
            .iter()
            .take_while(|(_, s)| (top - s).abs() < 1e-9)
            .any(|(i, _)| *i == Intent::DataRetrieval);
        let intent = if tied_retrieval { Intent::DataRetrieval } else { top_intent };
        return (intent, TIED);
    }

    let margin = (top - second) / top;
    let mut confidence = 0.55 + 0.3 * margin + 0.1 * top.min(3.0) / 3.0;
    if hint {
        confidence += HINT_BONUS;
    }
    let confidence = (confidence.min(CEILING) * 1000.0).round() / 1000.0;
    (top_intent, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::{normalize, Language};
    use crate::taxonomy::registry::tests::sample_snapshot;

    fn classify(text: &str) -> Classification {
        let utterance = normalize(text, None, Language::En);
        RuleBasedClassifier::new().score(&utterance, &sample_snapshot())
    }

    #[test]
    fn test_confidence_rejects_out_of_range() {
        assert!(Confidence::new(1.2).is_none());
        assert!(Confidence::new(-0.1).is_none());
        assert!(Confidence::new(f64::NAN).is_none());
        assert_eq!(Confidence::new(0.6).map(|c| c.value()), Some(0.6));
    }

    #[test]
    fn test_fallback_is_unreliable_retrieval() {
        assert_eq!(Intent::default(), Intent::DataRetrieval);
        let c = Classification::fallback();
        assert_eq!(c.intent, Intent::DataRetrieval);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_retrieval() {
        let c = classify("show fuel stock for Setu Filling Station");
        assert_eq!(c.intent, Intent::DataRetrieval);
        assert!(c.confidence >= 0.6);
    }

    #[test]
    fn test_dashboard() {
        let c = classify("add a bar chart of sales for Rupa Pharmacy to the dashboard");
        assert_eq!(c.intent, Intent::DashboardConfig);
        assert!(c.confidence >= 0.6);
    }

    #[test]
    fn test_alert() {
        let c = classify("alert me when fuel stock at Setu Filling Station drops below 500");
        assert_eq!(c.intent, Intent::AlertManagement);
        assert!(c.confidence >= 0.6);
    }

    #[test]
    fn test_bengali_retrieval() {
        let c = classify("সেতু পাম্পের গত সপ্তাহের বিক্রি দেখাও");
        assert_eq!(c.intent, Intent::DataRetrieval);
        assert!(c.confidence >= 0.6);
    }

    #[test]
    fn test_no_signal_is_unreliable() {
        let c = classify("hmm okay");
        assert_eq!(c.intent, Intent::DataRetrieval);
        assert!(c.confidence < 0.6);

        let hinted = classify("rupa pharmacy");
        assert_eq!(hinted.intent, Intent::DataRetrieval);
        assert!(hinted.confidence > c.confidence && hinted.confidence < 0.6);
    }

    #[test]
    fn test_tie_prefers_retrieval() {
        // "show" 1.5 vs "pin" 1.5
        let c = classify("show pin");
        assert_eq!(c.intent, Intent::DataRetrieval);
        assert!(c.confidence < 0.6);
    }

    #[test]
    fn test_deterministic() {
        let a = classify("chart sales vs last month");
        let b = classify("chart sales vs last month");
        assert_eq!(a, b);
    }
}
