//! Action Planner
//!
//! Maps an intent and its resolved slots to an ordered list of typed actions.
//! Actions are only planned here; executing them belongs to the data layer,
//! the dashboard store and the alerting subsystem.

use crate::entities::{
    BusinessUnitId, CompareTo, Granularity, MetricId, SlotName, SlotStatus, Threshold, Timeframe, Visualization,
};
use crate::intent::Intent;
use crate::resolver::Resolution;
use serde::Serialize;
use tracing::debug;

/// Which records a fetch covers along one axis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", content = "ids", rename_all = "snake_case")]
pub enum Scope<I> {
    All,
    Only(Vec<I>),
}

impl<I> Scope<I> {
    pub fn ids(&self) -> &[I] {
        match self {
            Scope::All => &[],
            Scope::Only(ids) => ids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchData {
    pub step: usize,
    pub business_units: Scope<BusinessUnitId>,
    pub metrics: Scope<MetricId>,
    pub timeframe: Option<Timeframe>,
    pub compare_to: Option<CompareTo>,
    pub granularity: Option<Granularity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigureDashboard {
    pub step: usize,
    /// Step of the `fetch_data` action this widget displays
    pub source_step: usize,
    pub visualization: Visualization,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateAlert {
    pub step: usize,
    pub metric: MetricId,
    pub business_units: Vec<BusinessUnitId>,
    pub threshold: Threshold,
    pub compare_to: Option<CompareTo>,
    pub timeframe: Option<Timeframe>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    FetchData(FetchData),
    ConfigureDashboard(ConfigureDashboard),
    CreateAlert(CreateAlert),
}

impl Action {
    pub fn step(&self) -> usize {
        match self {
            Action::FetchData(a) => a.step,
            Action::ConfigureDashboard(a) => a.step,
            Action::CreateAlert(a) => a.step,
        }
    }

    pub fn set_step(&mut self, step: usize) {
        match self {
            Action::FetchData(a) => a.step = step,
            Action::ConfigureDashboard(a) => a.step = step,
            Action::CreateAlert(a) => a.step = step,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Action::FetchData(_) => "fetch_data",
            Action::ConfigureDashboard(_) => "configure_dashboard",
            Action::CreateAlert(_) => "create_alert",
        }
    }
}

/// Planned actions plus required slots that were never mentioned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub actions: Vec<Action>,
    pub missing: Vec<SlotName>,
}

pub fn plan(intent: Intent, resolution: &Resolution) -> Plan {
    let mut plan = Plan::default();
    let entities = &resolution.entities;

    let units_clean = resolution.business_units.is_clean();
    let metrics_clean = resolution.metrics.is_clean();
    let units = resolution.business_units.resolved_ids();
    let metrics = resolution.metrics.resolved_ids();
    let units_absent = resolution.status(SlotName::BusinessUnit) == SlotStatus::Absent;
    let metrics_absent = resolution.status(SlotName::Metric) == SlotStatus::Absent;

    // A fetch needs at least one data slot, and no data slot half-resolved
    let fetch = if units_clean && metrics_clean && !(units.is_empty() && metrics.is_empty()) {
        Some(FetchData {
            step: 1,
            business_units: scope(units.clone()),
            metrics: scope(metrics.clone()),
            timeframe: entities.timeframe,
            compare_to: entities.compare_to,
            granularity: entities.granularity,
        })
    } else {
        None
    };

    match intent {
        Intent::DataRetrieval => {
            if units_absent && metrics_absent {
                plan.missing.push(SlotName::Metric);
            }
            if let Some(fetch) = fetch {
                plan.actions.push(Action::FetchData(fetch));
            }
        }
        Intent::DashboardConfig => {
            if units_absent && metrics_absent {
                plan.missing.push(SlotName::Metric);
            }
            if entities.visualization.is_none() {
                plan.missing.push(SlotName::Visualization);
            }
            if let (Some(fetch), Some(visualization)) = (fetch, entities.visualization) {
                plan.actions.push(Action::FetchData(fetch));
                plan.actions.push(Action::ConfigureDashboard(ConfigureDashboard {
                    step: 2,
                    source_step: 1,
                    visualization,
                }));
            }
        }
        Intent::AlertManagement => {
            if metrics_absent {
                plan.missing.push(SlotName::Metric);
            }
            if units_absent {
                plan.missing.push(SlotName::BusinessUnit);
            }
            if entities.threshold.is_none() {
                plan.missing.push(SlotName::Threshold);
            }
            let ready = units_clean && metrics_clean && !units.is_empty() && !metrics.is_empty();
            if let (true, Some(threshold)) = (ready, entities.threshold) {
                for (i, metric) in metrics.into_iter().enumerate() {
                    plan.actions.push(Action::CreateAlert(CreateAlert {
                        step: i + 1,
                        metric,
                        business_units: units.clone(),
                        threshold,
                        compare_to: entities.compare_to,
                        timeframe: entities.timeframe,
                    }));
                }
            }
        }
    }

    debug!(
        "Planned {} actions for {:?}, missing {:?}",
        plan.actions.len(),
        intent,
        plan.missing
    );
    plan
}

fn scope<I>(ids: Vec<I>) -> Scope<I> {
    if ids.is_empty() {
        Scope::All
    } else {
        Scope::Only(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{RelativePeriod, ThresholdOperator};
    use crate::extractor::CandidateBag;
    use crate::resolver::resolve;
    use crate::taxonomy::registry::tests::sample_snapshot;

    fn bag(units: &[&str], metrics: &[&str]) -> CandidateBag {
        CandidateBag {
            business_units: units.iter().map(|s| s.to_string()).collect(),
            metrics: metrics.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn below(value: f64) -> Threshold {
        Threshold {
            operator: ThresholdOperator::Below,
            value,
            percent: false,
        }
    }

    #[test]
    fn test_fetch_carries_resolved_slots() {
        let mut candidates = bag(&["setu filling station"], &["fuel stock"]);
        candidates.timeframe = Some(Timeframe::Relative(RelativePeriod::LastWeek));
        let plan = plan(Intent::DataRetrieval, &resolve(&candidates, &sample_snapshot()));

        assert_eq!(plan.actions.len(), 1);
        let Action::FetchData(fetch) = &plan.actions[0] else {
            panic!("expected fetch_data");
        };
        assert_eq!(fetch.business_units.ids()[0].as_str(), "setu_filling_station");
        assert_eq!(fetch.metrics.ids()[0].as_str(), "fuel_stock");
        assert_eq!(fetch.timeframe, candidates.timeframe);
        assert!(plan.missing.is_empty());
    }

    #[test]
    fn test_metric_only_fetch_covers_all_units() {
        let plan = plan(Intent::DataRetrieval, &resolve(&bag(&[], &["sales"]), &sample_snapshot()));
        let Action::FetchData(fetch) = &plan.actions[0] else {
            panic!("expected fetch_data");
        };
        assert_eq!(fetch.business_units, Scope::All);
    }

    #[test]
    fn test_ambiguous_unit_blocks_fetch() {
        let plan = plan(Intent::DataRetrieval, &resolve(&bag(&["setu fuel"], &["sales"]), &sample_snapshot()));
        assert!(plan.actions.is_empty());
        assert!(plan.missing.is_empty());
    }

    #[test]
    fn test_dashboard_references_fetch() {
        let mut candidates = bag(&["rupa pharmacy"], &["sales"]);
        candidates.visualization = Some(Visualization::Bar);
        let plan = plan(Intent::DashboardConfig, &resolve(&candidates, &sample_snapshot()));
        assert_eq!(plan.actions.len(), 2);
        let Action::ConfigureDashboard(dashboard) = &plan.actions[1] else {
            panic!("expected configure_dashboard");
        };
        assert_eq!(dashboard.source_step, plan.actions[0].step());
    }

    #[test]
    fn test_dashboard_without_visualization_asks() {
        let plan = plan(Intent::DashboardConfig, &resolve(&bag(&[], &["sales"]), &sample_snapshot()));
        assert!(plan.actions.is_empty());
        assert_eq!(plan.missing, vec![SlotName::Visualization]);
    }

    #[test]
    fn test_one_alert_per_metric() {
        let mut candidates = bag(&["setu filling station", "rupa pharmacy"], &["sales", "fuel stock"]);
        candidates.threshold = Some(below(500.0));
        let plan = plan(Intent::AlertManagement, &resolve(&candidates, &sample_snapshot()));
        assert_eq!(plan.actions.len(), 2);
        for (i, action) in plan.actions.iter().enumerate() {
            let Action::CreateAlert(alert) = action else {
                panic!("expected create_alert");
            };
            assert_eq!(alert.step, i + 1);
            assert_eq!(alert.business_units.len(), 2);
        }
    }

    #[test]
    fn test_alert_without_threshold_is_missing() {
        let plan = plan(
            Intent::AlertManagement,
            &resolve(&bag(&["rupa pharmacy"], &["sales"]), &sample_snapshot()),
        );
        assert!(plan.actions.is_empty());
        assert_eq!(plan.missing, vec![SlotName::Threshold]);
    }

    #[test]
    fn test_action_serialization_is_tagged() {
        let mut candidates = bag(&["rupa pharmacy"], &["sales"]);
        candidates.visualization = Some(Visualization::Line);
        let plan = plan(Intent::DashboardConfig, &resolve(&candidates, &sample_snapshot()));
        let json = serde_json::to_value(&plan.actions).unwrap();
        assert_eq!(json[0]["type"], "fetch_data");
        assert_eq!(json[0]["business_units"]["scope"], "only");
        assert_eq!(json[0]["business_units"]["ids"][0], "rupa_pharmacy");
        assert_eq!(json[1]["type"], "configure_dashboard");
        assert_eq!(json[1]["source_step"], 1);
    }
}
