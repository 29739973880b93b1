//! Chat-completions provider
//!
//! `LlmClient` talks to an OpenAI-compatible endpoint. `ProviderClassifier`
//! and `ProviderExtractor` put it behind the same traits as the rule-based
//! components; their replies are parsed into closed vocabularies and anything
//! outside them is dropped with a note.

use crate::config::ProviderConfig;
use crate::entities::{
    CompareTo, DateRange, Granularity, RelativePeriod, Threshold, ThresholdOperator, Timeframe, Visualization,
    Vocabulary,
};
use crate::error::{InterpretError, Result};
use crate::extractor::{CandidateBag, EntityExtractor};
use crate::intent::{Classification, Intent, IntentClassifier};
use crate::normalizer::Utterance;
use crate::taxonomy::TaxonomySnapshot;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const SYSTEM_PROMPT: &str =
    "You are a precise JSON-only responder for a business dashboard. Always return valid JSON, no other text.";

pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            api_key,
            base_url,
            model,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| InterpretError::Config("OPENAI_API_KEY is not set".to_string()))?;
        Ok(Self::new(api_key, config.base_url.clone(), config.model.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn call_llm(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.0,
            "max_tokens": 500
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| InterpretError::Provider(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InterpretError::Provider(format!("LLM API returned {}", status)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InterpretError::Provider(format!("Failed to parse LLM response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| InterpretError::Provider("No content in LLM response".to_string()))?;

        debug!("LLM replied with {} bytes", content.len());
        Ok(content.to_string())
    }
}

/// Strip markdown code fences models like to wrap JSON in
pub fn clean_json(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}

#[derive(Debug, Deserialize)]
struct ProviderIntent {
    intent: String,
    confidence: f64,
}

/// Parse a classification reply. The confidence is passed through unchecked;
/// the assembler owns range validation.
pub fn parse_classification(raw: &str) -> Result<Classification> {
    let reply: ProviderIntent = serde_json::from_str(clean_json(raw))
        .map_err(|e| InterpretError::Provider(format!("Failed to parse intent reply: {}", e)))?;
    let intent = Intent::from_key(&reply.intent)
        .ok_or_else(|| InterpretError::Provider(format!("Unknown intent '{}'", reply.intent)))?;
    Ok(Classification {
        intent,
        confidence: reply.confidence,
    })
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProviderTimeframe {
    Relative { relative: String },
    Absolute { start: String, end: String },
}

#[derive(Debug, Deserialize)]
struct ProviderThreshold {
    operator: String,
    value: f64,
    #[serde(default)]
    percent: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderEntities {
    business_units: Vec<String>,
    metrics: Vec<String>,
    timeframe: Option<ProviderTimeframe>,
    compare_to: Option<String>,
    granularity: Option<String>,
    visualization: Option<String>,
    threshold: Option<ProviderThreshold>,
}

/// Parse an extraction reply into candidates, keeping only closed-vocabulary values
pub fn parse_entities(raw: &str) -> Result<CandidateBag> {
    let reply: ProviderEntities = serde_json::from_str(clean_json(raw))
        .map_err(|e| InterpretError::Provider(format!("Failed to parse entity reply: {}", e)))?;

    let mut bag = CandidateBag {
        business_units: non_blank(reply.business_units),
        metrics: non_blank(reply.metrics),
        ..Default::default()
    };

    bag.timeframe = match reply.timeframe {
        None => None,
        Some(ProviderTimeframe::Relative { relative }) => {
            closed(&relative, "timeframe", &mut bag.notes).map(Timeframe::Relative)
        }
        Some(ProviderTimeframe::Absolute { start, end }) => {
            let parse = |s: &str| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok();
            match (parse(&start), parse(&end)) {
                (Some(a), Some(b)) => Some(Timeframe::Absolute(DateRange::new(a, b))),
                _ => {
                    bag.notes
                        .push(format!("Could not read the date range {} to {}; no timeframe applied.", start, end));
                    None
                }
            }
        }
    };
    bag.compare_to = reply
        .compare_to
        .and_then(|v| closed::<CompareTo>(&v, "comparison", &mut bag.notes));
    bag.granularity = reply
        .granularity
        .and_then(|v| closed::<Granularity>(&v, "granularity", &mut bag.notes));
    bag.visualization = reply
        .visualization
        .and_then(|v| closed::<Visualization>(&v, "visualization", &mut bag.notes));
    bag.threshold = match reply.threshold {
        Some(t) if t.value.is_finite() => closed::<ThresholdOperator>(&t.operator, "threshold operator", &mut bag.notes)
            .map(|operator| Threshold {
                operator,
                value: t.value,
                percent: t.percent,
            }),
        Some(_) => {
            bag.notes.push("Ignored a threshold without a usable number.".to_string());
            None
        }
        None => None,
    };

    Ok(bag)
}

fn closed<T: Vocabulary>(value: &str, slot: &str, notes: &mut Vec<String>) -> Option<T> {
    let parsed = T::from_key(value);
    if parsed.is_none() {
        notes.push(format!("Ignored unknown {} \"{}\".", slot, value));
    }
    parsed
}

fn non_blank(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

pub struct ProviderClassifier {
    client: Arc<LlmClient>,
}

impl ProviderClassifier {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IntentClassifier for ProviderClassifier {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn classify(&self, utterance: &Utterance, _snapshot: &TaxonomySnapshot) -> Result<Classification> {
        let prompt = format!(
            r#"Classify this dashboard command into exactly one intent: {}.
- data_retrieval: the user wants to see numbers
- dashboard_config: the user wants a chart or widget on the dashboard
- alert_management: the user wants to be notified when a value crosses a limit

Command ({}): "{}"

Return JSON in this exact format:
{{"intent": "data_retrieval", "confidence": 0.9}}"#,
            Intent::keys().join(", "),
            utterance.language(),
            utterance.text()
        );
        let reply = self.client.call_llm(&prompt).await?;
        parse_classification(&reply)
    }
}

pub struct ProviderExtractor {
    client: Arc<LlmClient>,
}

impl ProviderExtractor {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntityExtractor for ProviderExtractor {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn extract(
        &self,
        utterance: &Utterance,
        snapshot: &TaxonomySnapshot,
        reference: NaiveDate,
    ) -> Result<CandidateBag> {
        let prompt = format!(
            r#"Extract entities from this dashboard command. Today is {}.

Business units (copy the user's wording): {}
Metrics (copy the user's wording): {}
timeframe: {{"relative": one of [{}]}} or {{"start": "YYYY-MM-DD", "end": "YYYY-MM-DD"}} or null
compare_to: one of [{}] or null
granularity: one of [{}] or null
visualization: one of [{}] or null
threshold: {{"operator": one of [{}], "value": number, "percent": bool}} or null

Command: "{}"

Return JSON:
{{"business_units": [], "metrics": [], "timeframe": null, "compare_to": null,
 "granularity": null, "visualization": null, "threshold": null}}"#,
            reference,
            snapshot.business_unit_names().join(", "),
            snapshot.metric_names().join(", "),
            RelativePeriod::keys().join(", "),
            CompareTo::keys().join(", "),
            Granularity::keys().join(", "),
            Visualization::keys().join(", "),
            ThresholdOperator::keys().join(", "),
            utterance.text()
        );
        let reply = self.client.call_llm(&prompt).await?;
        parse_entities(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json_strips_fences() {
        assert_eq!(clean_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(clean_json("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_classification() {
        let c = parse_classification(r#"{"intent": "alert_management", "confidence": 0.82}"#).unwrap();
        assert_eq!(c.intent, Intent::AlertManagement);
        assert_eq!(c.confidence, 0.82);

        assert!(matches!(
            parse_classification(r#"{"intent": "delete_everything", "confidence": 1.0}"#),
            Err(InterpretError::Provider(_))
        ));
        assert!(parse_classification("not json").is_err());
    }

    #[test]
    fn test_out_of_range_confidence_passes_through() {
        let c = parse_classification(r#"{"intent": "data_retrieval", "confidence": 7.5}"#).unwrap();
        assert_eq!(c.confidence, 7.5);
    }

    #[test]
    fn test_parse_entities_keeps_closed_values() {
        let bag = parse_entities(
            r#"```json
{"business_units": ["Setu Filling Station", " "], "metrics": ["fuel stock"],
 "timeframe": {"start": "2024-03-31", "end": "2024-03-01"},
 "compare_to": "previous_month", "granularity": "fortnight", "visualization": "line",
 "threshold": {"operator": "below", "value": 500}}
```"#,
        )
        .unwrap();

        assert_eq!(bag.business_units, vec!["Setu Filling Station"]);
        match bag.timeframe {
            Some(Timeframe::Absolute(range)) => assert!(range.start() <= range.end()),
            other => panic!("unexpected timeframe {:?}", other),
        }
        assert_eq!(bag.compare_to, Some(CompareTo::PreviousMonth));
        assert_eq!(bag.granularity, None);
        assert_eq!(bag.visualization, Some(Visualization::Line));
        assert_eq!(bag.threshold.map(|t| t.operator), Some(ThresholdOperator::Below));
        assert_eq!(bag.notes.len(), 1);
    }

    #[test]
    fn test_parse_entities_relative_timeframe() {
        let bag = parse_entities(r#"{"timeframe": {"relative": "last_week"}}"#).unwrap();
        assert_eq!(bag.timeframe, Some(Timeframe::Relative(RelativePeriod::LastWeek)));
        assert!(bag.business_units.is_empty());
    }
}
