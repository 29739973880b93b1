//! Clarification Generator
//!
//! Builds follow-up questions, localized to the utterance's display language.
//! Followups are added next to whatever actions were already planned; they
//! never remove them.

use crate::entities::{SlotName, Visualization, Vocabulary};
use crate::normalizer::Language;
use crate::resolver::{Resolution, SlotResolution};
use crate::taxonomy::{TaxonomyMatch, TaxonomySnapshot};
use serde::Serialize;

/// Upper bound for any option list, including full registry listings
pub const MAX_LISTED_OPTIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowupReason {
    LowConfidence,
    Ambiguous,
    Unresolved,
    Missing,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Followup {
    pub question: String,
    pub options: Vec<String>,
    pub slot: Option<SlotName>,
    pub reason: FollowupReason,
}

/// The questions this layer can ask
#[derive(Debug, Clone, Copy)]
pub enum Prompt<'a> {
    RestateIntent,
    AmbiguousBusinessUnit(&'a str),
    AmbiguousMetric(&'a str),
    UnresolvedBusinessUnit(&'a str),
    UnresolvedMetric(&'a str),
    MissingBusinessUnit,
    MissingMetric,
    MissingVisualization,
    MissingThreshold,
    Rephrase,
}

impl Prompt<'_> {
    pub fn render(&self, language: Language) -> String {
        match (self, language) {
            (Prompt::RestateIntent, Language::En) => {
                concat!(
                    "I'm not sure what you'd like to do. ",
                    "Do you want to see data, change the dashboard or set up an alert?"
                )
                .to_string()
            }
            (Prompt::RestateIntent, Language::Bn) => {
                concat!(
                    "আপনি কী করতে চান বুঝতে পারিনি। ",
                    "আপনি কি ডেটা দেখতে, ড্যাশবোর্ড সাজাতে নাকি সতর্কতা তৈরি করতে চান?"
                )
                .to_string()
            }
            (Prompt::AmbiguousBusinessUnit(m), Language::En) => {
                format!("\"{}\" matches more than one business unit. Which one did you mean?", m)
            }
            (Prompt::AmbiguousBusinessUnit(m), Language::Bn) => {
                format!("\"{}\" একাধিক ব্যবসায়িক ইউনিটের সাথে মেলে। আপনি কোনটি বোঝাতে চেয়েছেন?", m)
            }
            (Prompt::AmbiguousMetric(m), Language::En) => {
                format!("\"{}\" matches more than one metric. Which one did you mean?", m)
            }
            (Prompt::AmbiguousMetric(m), Language::Bn) => {
                format!("\"{}\" একাধিক মেট্রিকের সাথে মেলে। আপনি কোনটি বোঝাতে চেয়েছেন?", m)
            }
            (Prompt::UnresolvedBusinessUnit(m), Language::En) => {
                format!("I couldn't find a business unit called \"{}\". Which business unit did you mean?", m)
            }
            (Prompt::UnresolvedBusinessUnit(m), Language::Bn) => {
                format!("\"{}\" নামে কোনো ব্যবসায়িক ইউনিট পাওয়া যায়নি। আপনি কোন ইউনিটের কথা বলছেন?", m)
            }
            (Prompt::UnresolvedMetric(m), Language::En) => {
                format!("I couldn't find a metric called \"{}\". Which metric did you mean?", m)
            }
            (Prompt::UnresolvedMetric(m), Language::Bn) => {
                format!("\"{}\" নামে কোনো মেট্রিক পাওয়া যায়নি। আপনি কোন মেট্রিক দেখতে চান?", m)
            }
            (Prompt::MissingBusinessUnit, Language::En) => "Which business unit should this apply to?".to_string(),
            (Prompt::MissingBusinessUnit, Language::Bn) => "এটি কোন ব্যবসায়িক ইউনিটের জন্য?".to_string(),
            (Prompt::MissingMetric, Language::En) => "Which metric would you like?".to_string(),
            (Prompt::MissingMetric, Language::Bn) => "আপনি কোন মেট্রিক চান?".to_string(),
            (Prompt::MissingVisualization, Language::En) => "How should this be shown on the dashboard?".to_string(),
            (Prompt::MissingVisualization, Language::Bn) => "ড্যাশবোর্ডে এটি কীভাবে দেখাতে চান?".to_string(),
            (Prompt::MissingThreshold, Language::En) => {
                "At what value should the alert fire? For example, \"below 500\".".to_string()
            }
            (Prompt::MissingThreshold, Language::Bn) => {
                "কোন মানে সতর্কতা দেওয়া হবে? যেমন, \"৫০০ এর নিচে\"।".to_string()
            }
            (Prompt::Rephrase, Language::En) => {
                "Sorry, I couldn't turn that into a dashboard command. Could you rephrase it?".to_string()
            }
            (Prompt::Rephrase, Language::Bn) => {
                "দুঃখিত, অনুরোধটি বুঝতে পারিনি। অনুগ্রহ করে অন্যভাবে বলবেন?".to_string()
            }
        }
    }
}

fn intent_options(language: Language) -> Vec<String> {
    let labels: [&str; 3] = match language {
        Language::En => ["See data", "Configure the dashboard", "Create an alert"],
        Language::Bn => ["ডেটা দেখা", "ড্যাশবোর্ড সাজানো", "সতর্কতা তৈরি"],
    };
    labels.iter().map(|s| s.to_string()).collect()
}

/// The generic restate-your-request followup used by the fallback paths
pub fn rephrase(language: Language) -> Followup {
    Followup {
        question: Prompt::Rephrase.render(language),
        options: Vec::new(),
        slot: None,
        reason: FollowupReason::Fallback,
    }
}

/// Everything the generator looks at
pub struct ClarificationInput<'a> {
    pub language: Language,
    pub confidence: f64,
    pub reliable_threshold: f64,
    pub resolution: &'a Resolution,
    /// Required slots the planner found absent
    pub missing: &'a [SlotName],
    pub snapshot: &'a TaxonomySnapshot,
    pub max_options: usize,
}

pub fn generate(input: &ClarificationInput<'_>) -> Vec<Followup> {
    let mut followups = Vec::new();
    let language = input.language;

    if input.confidence.is_nan() || input.confidence < input.reliable_threshold {
        followups.push(Followup {
            question: Prompt::RestateIntent.render(language),
            options: intent_options(language),
            slot: None,
            reason: FollowupReason::LowConfidence,
        });
    }

    ambiguity_followups(&input.resolution.business_units, SlotName::BusinessUnit, input, &mut followups);
    ambiguity_followups(&input.resolution.metrics, SlotName::Metric, input, &mut followups);

    unresolved_followup(
        &input.resolution.business_units,
        SlotName::BusinessUnit,
        input.snapshot.business_unit_names(),
        language,
        &mut followups,
    );
    unresolved_followup(
        &input.resolution.metrics,
        SlotName::Metric,
        input.snapshot.metric_names(),
        language,
        &mut followups,
    );

    for slot in input.missing {
        let (prompt, options) = match slot {
            SlotName::BusinessUnit => (Prompt::MissingBusinessUnit, input.snapshot.business_unit_names()),
            SlotName::Metric => (Prompt::MissingMetric, input.snapshot.metric_names()),
            SlotName::Visualization => (
                Prompt::MissingVisualization,
                Visualization::keys().into_iter().map(String::from).collect(),
            ),
            SlotName::Threshold => (Prompt::MissingThreshold, Vec::new()),
            _ => continue,
        };
        followups.push(Followup {
            question: prompt.render(language),
            options: bounded(options, MAX_LISTED_OPTIONS),
            slot: Some(*slot),
            reason: FollowupReason::Missing,
        });
    }

    followups
}

fn ambiguity_followups<I>(
    slot_resolution: &SlotResolution<I>,
    slot: SlotName,
    input: &ClarificationInput<'_>,
    followups: &mut Vec<Followup>,
) where
    I: Clone + PartialEq,
{
    let mut asked: Vec<Vec<String>> = Vec::new();
    for (mention, hits) in slot_resolution.ambiguous() {
        let options = candidate_names(hits, input.max_options);
        if asked.contains(&options) {
            continue;
        }
        asked.push(options.clone());
        followups.push(Followup {
            question: ambiguous_prompt(slot, mention).render(input.language),
            options,
            slot: Some(slot),
            reason: FollowupReason::Ambiguous,
        });
    }
}

fn unresolved_followup<I>(
    slot_resolution: &SlotResolution<I>,
    slot: SlotName,
    all_names: Vec<String>,
    language: Language,
    followups: &mut Vec<Followup>,
) where
    I: Clone + PartialEq,
{
    let unresolved = slot_resolution.unresolved();
    if unresolved.is_empty() {
        return;
    }
    let mentions = unresolved.join("\", \"");
    followups.push(Followup {
        question: unresolved_prompt(slot, &mentions).render(language),
        options: bounded(all_names, MAX_LISTED_OPTIONS),
        slot: Some(slot),
        reason: FollowupReason::Unresolved,
    });
}

fn ambiguous_prompt(slot: SlotName, mention: &str) -> Prompt<'_> {
    match slot {
        SlotName::BusinessUnit => Prompt::AmbiguousBusinessUnit(mention),
        _ => Prompt::AmbiguousMetric(mention),
    }
}

fn unresolved_prompt(slot: SlotName, mention: &str) -> Prompt<'_> {
    match slot {
        SlotName::BusinessUnit => Prompt::UnresolvedBusinessUnit(mention),
        _ => Prompt::UnresolvedMetric(mention),
    }
}

/// Tied candidates are already ranked; the lowest-ranked are dropped
fn candidate_names<I>(hits: &[TaxonomyMatch<I>], max: usize) -> Vec<String> {
    let names: Vec<String> = hits.iter().map(|h| h.name.clone()).collect();
    bounded(names, max)
}

fn bounded(mut options: Vec<String>, max: usize) -> Vec<String> {
    options.truncate(max);
    options
}
