//! Response Assembler
//!
//! Packages pipeline output into an `InterpretationResult` and checks it
//! against the output contract. A draft that fails is repaired once; if the
//! repair still fails, the minimal fallback result is returned instead.

use crate::clarification::{rephrase, Followup, FollowupReason, MAX_LISTED_OPTIONS};
use crate::config::InterpreterConfig;
use crate::entities::{EntityBag, SlotName, SlotStatus, SlotValue};
use crate::intent::{Confidence, Intent};
use crate::normalizer::Language;
use crate::planner::Action;
use crate::taxonomy::TaxonomySnapshot;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Everything the pipeline produced, not yet checked
#[derive(Debug, Clone)]
pub struct ResultDraft {
    pub language: Language,
    pub intent: Intent,
    pub confidence: f64,
    pub entities: EntityBag,
    pub slot_status: BTreeMap<SlotName, SlotStatus>,
    pub actions: Vec<Action>,
    pub followups: Vec<Followup>,
    pub notes: Vec<String>,
}

/// A result that satisfies the output contract. Only the assembler builds one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterpretationResult {
    ui_language: Language,
    intent: Intent,
    confidence: Confidence,
    entities: EntityBag,
    slot_status: BTreeMap<SlotName, SlotStatus>,
    actions: Vec<Action>,
    followups: Vec<Followup>,
    notes: Vec<String>,
    taxonomy_version: u64,
}

impl InterpretationResult {
    pub fn ui_language(&self) -> Language {
        self.ui_language
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn entities(&self) -> &EntityBag {
        &self.entities
    }

    pub fn slot_status(&self, slot: SlotName) -> SlotStatus {
        self.slot_status.get(&slot).copied().unwrap_or(SlotStatus::Absent)
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn followups(&self) -> &[Followup] {
        &self.followups
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn taxonomy_version(&self) -> u64 {
        self.taxonomy_version
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub struct ResponseAssembler<'a> {
    snapshot: &'a TaxonomySnapshot,
    max_options: usize,
}

impl<'a> ResponseAssembler<'a> {
    pub fn new(snapshot: &'a TaxonomySnapshot, config: &InterpreterConfig) -> Self {
        Self {
            snapshot,
            max_options: config.max_followup_options,
        }
    }

    pub fn assemble(&self, draft: ResultDraft) -> InterpretationResult {
        let violations = self.validate(&draft);
        if violations.is_empty() {
            if let Some(result) = self.seal(draft.clone()) {
                return result;
            }
        }

        warn!("⚠️  Result failed contract checks, repairing: {}", violations.join("; "));
        let language = draft.language;
        let repaired = self.repair(draft);
        let remaining = self.validate(&repaired);
        if remaining.is_empty() {
            if let Some(result) = self.seal(repaired) {
                info!("Repaired result accepted");
                return result;
            }
        }

        warn!("⚠️  Repair failed ({}), returning minimal result", remaining.join("; "));
        self.minimal(language)
    }

    /// Contract violations, empty when the draft is valid
    pub fn validate(&self, draft: &ResultDraft) -> Vec<String> {
        let mut violations = Vec::new();

        if Confidence::new(draft.confidence).is_none() {
            violations.push(format!("confidence {} outside [0, 1]", draft.confidence));
        }

        for id in draft.entities.business_units() {
            if !self.snapshot.has_business_unit(&id) {
                violations.push(format!("unknown business unit id '{}'", id));
            }
        }
        for id in draft.entities.metrics() {
            if !self.snapshot.has_metric(&id) {
                violations.push(format!("unknown metric id '{}'", id));
            }
        }
        if let Some(threshold) = &draft.entities.threshold {
            if !threshold.value.is_finite() {
                violations.push("threshold value is not finite".to_string());
            }
        }

        violations.extend(self.action_violations(&draft.actions));

        for (i, followup) in draft.followups.iter().enumerate() {
            if followup.question.trim().is_empty() {
                violations.push(format!("followup {} has an empty question", i));
            }
            let bound = self.option_bound(followup.reason);
            if followup.options.len() > bound {
                violations.push(format!(
                    "followup {} has {} options, limit {}",
                    i,
                    followup.options.len(),
                    bound
                ));
            }
            if followup.options.iter().any(|o| o.trim().is_empty()) {
                violations.push(format!("followup {} has an empty option", i));
            }
        }

        if draft.actions.is_empty() && draft.followups.is_empty() {
            violations.push("result has neither actions nor followups".to_string());
        }

        violations
    }

    fn option_bound(&self, reason: FollowupReason) -> usize {
        match reason {
            FollowupReason::Ambiguous => self.max_options,
            _ => MAX_LISTED_OPTIONS,
        }
    }

    fn action_violations(&self, actions: &[Action]) -> Vec<String> {
        let mut violations = Vec::new();
        let mut fetch_steps: HashSet<usize> = HashSet::new();

        for (i, action) in actions.iter().enumerate() {
            if action.step() != i + 1 {
                violations.push(format!("{} at position {} has step {}", action.type_name(), i + 1, action.step()));
            }
            match action {
                Action::FetchData(fetch) => {
                    if fetch.business_units.ids().is_empty() && fetch.metrics.ids().is_empty() {
                        violations.push(format!("fetch_data step {} has no business unit or metric", fetch.step));
                    }
                    for id in fetch.business_units.ids() {
                        if !self.snapshot.has_business_unit(id) {
                            violations.push(format!("fetch_data step {} references unknown unit '{}'", fetch.step, id));
                        }
                    }
                    for id in fetch.metrics.ids() {
                        if !self.snapshot.has_metric(id) {
                            violations.push(format!(
                                "fetch_data step {} references unknown metric '{}'",
                                fetch.step, id
                            ));
                        }
                    }
                    fetch_steps.insert(fetch.step);
                }
                Action::ConfigureDashboard(dashboard) => {
                    if !fetch_steps.contains(&dashboard.source_step) {
                        violations.push(format!(
                            "configure_dashboard step {} references missing fetch step {}",
                            dashboard.step, dashboard.source_step
                        ));
                    }
                }
                Action::CreateAlert(alert) => {
                    if !self.snapshot.has_metric(&alert.metric) {
                        violations.push(format!(
                            "create_alert step {} has unknown metric '{}'",
                            alert.step, alert.metric
                        ));
                    }
                    if alert.business_units.is_empty() {
                        violations.push(format!("create_alert step {} has no business unit", alert.step));
                    }
                    for id in &alert.business_units {
                        if !self.snapshot.has_business_unit(id) {
                            violations.push(format!("create_alert step {} has unknown unit '{}'", alert.step, id));
                        }
                    }
                    if !alert.threshold.value.is_finite() {
                        violations.push(format!("create_alert step {} threshold is not finite", alert.step));
                    }
                }
            }
        }
        violations
    }

    /// One pass of substituting defaults for whatever is invalid
    fn repair(&self, mut draft: ResultDraft) -> ResultDraft {
        let mut fixes: Vec<&str> = Vec::new();

        if Confidence::new(draft.confidence).is_none() {
            draft.confidence = 0.0;
            fixes.push("confidence reset");
        }

        let units: Vec<_> = draft
            .entities
            .business_units()
            .into_iter()
            .filter(|id| self.snapshot.has_business_unit(id))
            .collect();
        if units.len() != draft.entities.business_units().len() {
            draft.entities.business_unit = SlotValue::from_values(units);
            let status = status_after_drop(
                draft.entities.business_unit.as_ref(),
                &draft.slot_status,
                SlotName::BusinessUnit,
            );
            draft.slot_status.insert(SlotName::BusinessUnit, status);
            fixes.push("unknown business units dropped");
        }
        let metrics: Vec<_> = draft
            .entities
            .metrics()
            .into_iter()
            .filter(|id| self.snapshot.has_metric(id))
            .collect();
        if metrics.len() != draft.entities.metrics().len() {
            draft.entities.metric = SlotValue::from_values(metrics);
            let status = status_after_drop(draft.entities.metric.as_ref(), &draft.slot_status, SlotName::Metric);
            draft.slot_status.insert(SlotName::Metric, status);
            fixes.push("unknown metrics dropped");
        }
        if draft.entities.threshold.map(|t| !t.value.is_finite()).unwrap_or(false) {
            draft.entities.threshold = None;
            draft.slot_status.insert(SlotName::Threshold, SlotStatus::Absent);
            fixes.push("threshold dropped");
        }

        let before = draft.actions.len();
        draft.actions = self.keep_valid_actions(draft.actions);
        if draft.actions.len() != before {
            fixes.push("invalid actions dropped");
        }

        let max_options = self.max_options;
        draft.followups.retain(|f| !f.question.trim().is_empty());
        for followup in &mut draft.followups {
            followup.options.retain(|o| !o.trim().is_empty());
            let bound = match followup.reason {
                FollowupReason::Ambiguous => max_options,
                _ => MAX_LISTED_OPTIONS,
            };
            followup.options.truncate(bound);
        }

        if draft.actions.is_empty() && draft.followups.is_empty() {
            draft.followups.push(rephrase(draft.language));
            fixes.push("rephrase followup added");
        }

        draft.notes.push(format!("Result repaired: {}.", fixes.join(", ")));
        draft
    }

    /// Drop invalid actions, then renumber steps and dashboard references
    fn keep_valid_actions(&self, actions: Vec<Action>) -> Vec<Action> {
        let mut kept: Vec<Action> = Vec::new();
        let mut renumbered: BTreeMap<usize, usize> = BTreeMap::new();

        for mut action in actions {
            let old_step = action.step();
            let valid = match &mut action {
                Action::FetchData(fetch) => {
                    !(fetch.business_units.ids().is_empty() && fetch.metrics.ids().is_empty())
                        && fetch.business_units.ids().iter().all(|id| self.snapshot.has_business_unit(id))
                        && fetch.metrics.ids().iter().all(|id| self.snapshot.has_metric(id))
                }
                Action::ConfigureDashboard(dashboard) => match renumbered.get(&dashboard.source_step) {
                    Some(new_source) => {
                        dashboard.source_step = *new_source;
                        true
                    }
                    None => false,
                },
                Action::CreateAlert(alert) => {
                    self.snapshot.has_metric(&alert.metric)
                        && !alert.business_units.is_empty()
                        && alert.business_units.iter().all(|id| self.snapshot.has_business_unit(id))
                        && alert.threshold.value.is_finite()
                }
            };
            if !valid {
                continue;
            }
            let new_step = kept.len() + 1;
            if matches!(action, Action::FetchData(_)) {
                renumbered.insert(old_step, new_step);
            }
            action.set_step(new_step);
            kept.push(action);
        }
        kept
    }

    fn seal(&self, draft: ResultDraft) -> Option<InterpretationResult> {
        Some(InterpretationResult {
            ui_language: draft.language,
            intent: draft.intent,
            confidence: Confidence::new(draft.confidence)?,
            entities: draft.entities,
            slot_status: draft.slot_status,
            actions: draft.actions,
            followups: draft.followups,
            notes: draft.notes,
            taxonomy_version: self.snapshot.version(),
        })
    }

    /// data_retrieval, zero confidence, nothing resolved, one rephrase followup
    pub fn minimal(&self, language: Language) -> InterpretationResult {
        InterpretationResult {
            ui_language: language,
            intent: Intent::DataRetrieval,
            confidence: Confidence::ZERO,
            entities: EntityBag::default(),
            slot_status: SlotName::ALL.iter().map(|s| (*s, SlotStatus::Absent)).collect(),
            actions: Vec::new(),
            followups: vec![rephrase(language)],
            notes: vec!["The request could not be interpreted.".to_string()],
            taxonomy_version: self.snapshot.version(),
        }
    }
}

/// Slot status once unknown ids are gone; a slot that had mentions stays unresolved
fn status_after_drop<T>(
    value: Option<&SlotValue<T>>,
    statuses: &BTreeMap<SlotName, SlotStatus>,
    slot: SlotName,
) -> SlotStatus {
    match value {
        Some(SlotValue::One(_)) => SlotStatus::ResolvedSingle,
        Some(SlotValue::Many(_)) => SlotStatus::ResolvedMultiple,
        None => match statuses.get(&slot) {
            None | Some(SlotStatus::Absent) => SlotStatus::Absent,
            Some(_) => SlotStatus::Unresolved,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{BusinessUnitId, MetricId, Threshold, ThresholdOperator, Visualization};
    use crate::planner::{ConfigureDashboard, CreateAlert, FetchData, Scope};
    use crate::taxonomy::registry::tests::sample_snapshot;

    fn fetch(step: usize, metric: &str) -> Action {
        Action::FetchData(FetchData {
            step,
            business_units: Scope::All,
            metrics: Scope::Only(vec![MetricId::new(metric)]),
            timeframe: None,
            compare_to: None,
            granularity: None,
        })
    }

    fn dashboard(step: usize, source_step: usize) -> Action {
        Action::ConfigureDashboard(ConfigureDashboard {
            step,
            source_step,
            visualization: Visualization::Line,
        })
    }

    fn draft(actions: Vec<Action>) -> ResultDraft {
        ResultDraft {
            language: Language::En,
            intent: Intent::DashboardConfig,
            confidence: 0.9,
            entities: EntityBag::default(),
            slot_status: BTreeMap::new(),
            actions,
            followups: Vec::new(),
            notes: Vec::new(),
        }
    }

    #[test]
    fn test_valid_draft_passes_through() {
        let snapshot = sample_snapshot();
        let assembler = ResponseAssembler::new(&snapshot, &InterpreterConfig::default());
        let d = draft(vec![fetch(1, "sales"), dashboard(2, 1)]);
        assert!(assembler.validate(&d).is_empty());
        let result = assembler.assemble(d);
        assert_eq!(result.actions().len(), 2);
        assert!(result.notes().is_empty());
        assert_eq!(result.taxonomy_version(), 1);
    }

    #[test]
    fn test_unknown_unit_dropped_leaves_slot_unresolved() {
        let snapshot = sample_snapshot();
        let assembler = ResponseAssembler::new(&snapshot, &InterpreterConfig::default());
        let mut d = draft(vec![fetch(1, "sales")]);
        d.entities.business_unit = Some(SlotValue::One(BusinessUnitId::new("ghost_station")));
        d.slot_status.insert(SlotName::BusinessUnit, SlotStatus::ResolvedSingle);
        d.entities.metric = Some(SlotValue::Many(vec![MetricId::new("sales"), MetricId::new("ghost_metric")]));
        d.slot_status.insert(SlotName::Metric, SlotStatus::ResolvedMultiple);

        let result = assembler.assemble(d);
        assert_eq!(result.entities().business_units(), Vec::<BusinessUnitId>::new());
        assert_eq!(result.slot_status(SlotName::BusinessUnit), SlotStatus::Unresolved);
        assert_eq!(result.entities().metrics(), vec![MetricId::new("sales")]);
        assert_eq!(result.slot_status(SlotName::Metric), SlotStatus::ResolvedSingle);
    }

    #[test]
    fn test_dangling_dashboard_is_dropped() {
        let snapshot = sample_snapshot();
        let assembler = ResponseAssembler::new(&snapshot, &InterpreterConfig::default());
        let result = assembler.assemble(draft(vec![fetch(1, "sales"), dashboard(2, 7)]));
        assert_eq!(result.actions().len(), 1);
        assert_eq!(result.actions()[0].type_name(), "fetch_data");
        assert_eq!(result.notes().len(), 1);
    }

    #[test]
    fn test_unknown_ids_are_removed_and_steps_renumbered() {
        let snapshot = sample_snapshot();
        let assembler = ResponseAssembler::new(&snapshot, &InterpreterConfig::default());
        let mut d = draft(vec![fetch(1, "footfall"), fetch(2, "sales"), dashboard(3, 2)]);
        d.entities.metric = SlotValue::from_values(vec![MetricId::new("footfall"), MetricId::new("sales")]);
        let result = assembler.assemble(d);

        assert_eq!(result.entities().metrics(), vec![MetricId::new("sales")]);
        assert_eq!(result.actions().len(), 2);
        let Action::ConfigureDashboard(widget) = &result.actions()[1] else {
            panic!("expected configure_dashboard");
        };
        assert_eq!(widget.step, 2);
        assert_eq!(widget.source_step, 1);
    }

    #[test]
    fn test_bad_confidence_is_reset() {
        let snapshot = sample_snapshot();
        let assembler = ResponseAssembler::new(&snapshot, &InterpreterConfig::default());
        let mut d = draft(vec![fetch(1, "sales")]);
        d.confidence = f64::NAN;
        let result = assembler.assemble(d);
        assert_eq!(result.confidence().value(), 0.0);
        assert_eq!(result.actions().len(), 1);
    }

    #[test]
    fn test_empty_result_gets_rephrase_followup() {
        let snapshot = sample_snapshot();
        let assembler = ResponseAssembler::new(&snapshot, &InterpreterConfig::default());
        let result = assembler.assemble(draft(Vec::new()));
        assert!(result.actions().is_empty());
        assert_eq!(result.followups().len(), 1);
        assert_eq!(result.followups()[0].reason, FollowupReason::Fallback);
    }

    #[test]
    fn test_alert_with_non_finite_threshold_is_dropped() {
        let snapshot = sample_snapshot();
        let assembler = ResponseAssembler::new(&snapshot, &InterpreterConfig::default());
        let alert = Action::CreateAlert(CreateAlert {
            step: 1,
            metric: MetricId::new("sales"),
            business_units: vec![BusinessUnitId::new("rupa_pharmacy")],
            threshold: Threshold {
                operator: ThresholdOperator::Above,
                value: f64::INFINITY,
                percent: false,
            },
            compare_to: None,
            timeframe: None,
        });
        let result = assembler.assemble(draft(vec![alert]));
        assert!(result.actions().is_empty());
        assert!(!result.followups().is_empty());
    }

    #[test]
    fn test_long_ambiguity_list_is_truncated() {
        let snapshot = sample_snapshot();
        let assembler = ResponseAssembler::new(&snapshot, &InterpreterConfig::default());
        let mut d = draft(Vec::new());
        d.followups.push(Followup {
            question: "Which one?".to_string(),
            options: (0..9).map(|i| format!("option {}", i)).collect(),
            slot: Some(SlotName::BusinessUnit),
            reason: FollowupReason::Ambiguous,
        });
        let result = assembler.assemble(d);
        assert_eq!(result.followups()[0].options.len(), 5);
    }

    #[test]
    fn test_minimal_result_shape() {
        let snapshot = sample_snapshot();
        let assembler = ResponseAssembler::new(&snapshot, &InterpreterConfig::default());
        let result = assembler.minimal(Language::Bn);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["ui_language"], "bn");
        assert_eq!(json["intent"], "data_retrieval");
        assert_eq!(json["confidence"], 0.0);
        assert_eq!(json["slot_status"]["metric"], "absent");
        assert_eq!(json["followups"].as_array().unwrap().len(), 1);
    }
}
