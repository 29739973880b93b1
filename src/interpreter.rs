//! Interpreter
//!
//! Runs one request through normalize → classify/extract → resolve → plan →
//! clarify → assemble. Classifier and extractor calls are bounded by the
//! provider timeout; a timeout or provider failure degrades to the
//! low-confidence path instead of failing the request.

use crate::assembler::{InterpretationResult, ResponseAssembler, ResultDraft};
use crate::clarification::{self, ClarificationInput};
use crate::config::InterpreterConfig;
use crate::error::{InterpretError, Result};
use crate::extractor::{CandidateBag, EntityExtractor, RuleBasedExtractor};
use crate::intent::{Classification, IntentClassifier, RuleBasedClassifier};
use crate::normalizer::{normalize, Language};
use crate::planner;
use crate::resolver;
use crate::taxonomy::TaxonomyRegistry;
use chrono::{Local, NaiveDate};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct InterpretRequest {
    pub query: String,
    pub locale_hint: Option<Language>,
    /// Anchor for "past N days" and "since" ranges; defaults to today
    pub reference_date: Option<NaiveDate>,
}

impl InterpretRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            locale_hint: None,
            reference_date: None,
        }
    }

    pub fn with_locale(mut self, language: Language) -> Self {
        self.locale_hint = Some(language);
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }
}

pub struct Interpreter {
    registry: Arc<TaxonomyRegistry>,
    classifier: Arc<dyn IntentClassifier>,
    extractor: Arc<dyn EntityExtractor>,
    config: InterpreterConfig,
}

impl Interpreter {
    /// Interpreter with the rule-based classifier and extractor
    pub fn new(registry: Arc<TaxonomyRegistry>, config: InterpreterConfig) -> Self {
        Self::with_components(
            registry,
            Arc::new(RuleBasedClassifier::new()),
            Arc::new(RuleBasedExtractor::new()),
            config,
        )
    }

    pub fn with_components(
        registry: Arc<TaxonomyRegistry>,
        classifier: Arc<dyn IntentClassifier>,
        extractor: Arc<dyn EntityExtractor>,
        config: InterpreterConfig,
    ) -> Self {
        Self {
            registry,
            classifier,
            extractor,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<TaxonomyRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Interpret one utterance. Never fails: every path ends in a valid result.
    pub async fn interpret(&self, request: InterpretRequest) -> InterpretationResult {
        let request_id = Uuid::new_v4();
        // Held for the whole request; a concurrent reload does not affect it
        let snapshot = self.registry.snapshot();
        let assembler = ResponseAssembler::new(&snapshot, &self.config);

        let utterance = normalize(&request.query, request.locale_hint, self.config.default_language);
        info!(
            "🧭 [{}] Interpreting \"{}\" (lang={}, taxonomy v{})",
            request_id,
            utterance.text(),
            utterance.language(),
            snapshot.version()
        );

        let mut notes: Vec<String> = Vec::new();
        let reference = request.reference_date.unwrap_or_else(|| Local::now().date_naive());
        let limit = self.config.provider_timeout();

        let (classification, candidates) = if utterance.is_empty() {
            notes.push("The request was empty.".to_string());
            (Classification::fallback(), CandidateBag::default())
        } else {
            let (classified, extracted) = tokio::join!(
                bounded(limit, self.classifier.classify(&utterance, &snapshot)),
                bounded(limit, self.extractor.extract(&utterance, &snapshot, reference)),
            );

            let mut classification = classified.unwrap_or_else(|e| {
                warn!("⚠️  [{}] Classifier '{}' failed: {}", request_id, self.classifier.name(), e);
                notes.push(degraded_note("Intent classification", &e));
                Classification::fallback()
            });
            let candidates = match extracted {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("⚠️  [{}] Extractor '{}' failed: {}", request_id, self.extractor.name(), e);
                    notes.push(degraded_note("Entity extraction", &e));
                    // Nothing was extracted, so the intent alone cannot be trusted
                    classification.confidence = 0.0;
                    CandidateBag::default()
                }
            };
            (classification, candidates)
        };
        debug!(
            "[{}] Classified as {:?} ({:.3})",
            request_id, classification.intent, classification.confidence
        );
        notes.extend(candidates.notes.iter().cloned());

        let resolution = resolver::resolve(&candidates, &snapshot);
        let plan = planner::plan(classification.intent, &resolution);
        let followups = clarification::generate(&ClarificationInput {
            language: utterance.language(),
            confidence: classification.confidence,
            reliable_threshold: self.config.reliable_threshold,
            resolution: &resolution,
            missing: &plan.missing,
            snapshot: &snapshot,
            max_options: self.config.max_followup_options,
        });

        let result = assembler.assemble(ResultDraft {
            language: utterance.language(),
            intent: classification.intent,
            confidence: classification.confidence,
            entities: resolution.entities,
            slot_status: resolution.slot_status,
            actions: plan.actions,
            followups,
            notes,
        });

        info!(
            "✅ [{}] {:?} with {} actions, {} followups",
            request_id,
            result.intent(),
            result.actions().len(),
            result.followups().len()
        );
        result
    }
}

/// Bound a classifier or extractor call
async fn bounded<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(InterpretError::Timeout(limit)),
    }
}

fn degraded_note(stage: &str, error: &InterpretError) -> String {
    match error {
        InterpretError::Timeout(limit) => format!("{} timed out after {} ms.", stage, limit.as_millis()),
        _ => format!("{} was unavailable.", stage),
    }
}
