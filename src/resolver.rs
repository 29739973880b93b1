//! Taxonomy Resolver
//!
//! Resolves raw business unit and metric mentions against one snapshot. Each
//! mention is resolved, ambiguous (several tied candidates) or unresolved; the
//! slot status summarises its mentions.

use crate::entities::{BusinessUnitId, EntityBag, MetricId, SlotName, SlotStatus, SlotValue};
use crate::extractor::CandidateBag;
use crate::taxonomy::{tied, TaxonomyMatch, TaxonomySnapshot};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum MentionResolution<I> {
    Resolved(TaxonomyMatch<I>),
    /// Tied top candidates, ranked
    Ambiguous(Vec<TaxonomyMatch<I>>),
    Unresolved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MentionOutcome<I> {
    pub mention: String,
    pub resolution: MentionResolution<I>,
}

/// Per-mention outcomes for one reference slot
#[derive(Debug, Clone, PartialEq)]
pub struct SlotResolution<I> {
    pub mentions: Vec<MentionOutcome<I>>,
}

impl<I: Clone + PartialEq> SlotResolution<I> {
    fn resolve_all(mentions: &[String], lookup: impl Fn(&str) -> Vec<TaxonomyMatch<I>>, delta: f64) -> Self {
        let mentions = mentions
            .iter()
            .map(|mention| {
                let matches = lookup(mention);
                let top = tied(&matches, delta);
                let resolution = match top.len() {
                    0 => MentionResolution::Unresolved,
                    1 => MentionResolution::Resolved(top[0].clone()),
                    _ => MentionResolution::Ambiguous(top.to_vec()),
                };
                MentionOutcome {
                    mention: mention.clone(),
                    resolution,
                }
            })
            .collect();
        Self { mentions }
    }

    pub fn status(&self) -> SlotStatus {
        if self.mentions.is_empty() {
            return SlotStatus::Absent;
        }
        if !self.ambiguous().is_empty() {
            return SlotStatus::ResolvedMultiple;
        }
        match SlotValue::from_values(self.resolved_ids()) {
            Some(SlotValue::One(_)) => SlotStatus::ResolvedSingle,
            Some(SlotValue::Many(_)) => SlotStatus::ResolvedMultiple,
            None => SlotStatus::Unresolved,
        }
    }

    /// Every mention resolved to exactly one entry
    pub fn is_clean(&self) -> bool {
        self.mentions
            .iter()
            .all(|m| matches!(m.resolution, MentionResolution::Resolved(_)))
    }

    pub fn resolved_ids(&self) -> Vec<I> {
        self.mentions
            .iter()
            .filter_map(|m| match &m.resolution {
                MentionResolution::Resolved(hit) => Some(hit.id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Resolved ids followed by the tied candidates of ambiguous mentions
    pub fn reported_ids(&self) -> Vec<I> {
        let mut ids = Vec::new();
        for m in &self.mentions {
            match &m.resolution {
                MentionResolution::Resolved(hit) => ids.push(hit.id.clone()),
                MentionResolution::Ambiguous(hits) => ids.extend(hits.iter().map(|h| h.id.clone())),
                MentionResolution::Unresolved => {}
            }
        }
        ids
    }

    pub fn ambiguous(&self) -> Vec<(&str, &[TaxonomyMatch<I>])> {
        self.mentions
            .iter()
            .filter_map(|m| match &m.resolution {
                MentionResolution::Ambiguous(hits) => Some((m.mention.as_str(), hits.as_slice())),
                _ => None,
            })
            .collect()
    }

    pub fn unresolved(&self) -> Vec<&str> {
        self.mentions
            .iter()
            .filter(|m| matches!(m.resolution, MentionResolution::Unresolved))
            .map(|m| m.mention.as_str())
            .collect()
    }
}

/// Resolver output: canonical entities plus everything clarification needs
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub entities: EntityBag,
    pub slot_status: BTreeMap<SlotName, SlotStatus>,
    pub business_units: SlotResolution<BusinessUnitId>,
    pub metrics: SlotResolution<MetricId>,
}

impl Resolution {
    pub fn status(&self, slot: SlotName) -> SlotStatus {
        self.slot_status.get(&slot).copied().unwrap_or(SlotStatus::Absent)
    }
}

pub fn resolve(candidates: &CandidateBag, snapshot: &TaxonomySnapshot) -> Resolution {
    let delta = snapshot.tie_delta();
    let business_units = SlotResolution::resolve_all(
        &candidates.business_units,
        |text| snapshot.lookup_business_unit(text),
        delta,
    );
    let metrics = SlotResolution::resolve_all(&candidates.metrics, |text| snapshot.lookup_metric(text), delta);

    let entities = EntityBag {
        business_unit: SlotValue::from_values(business_units.reported_ids()),
        metric: SlotValue::from_values(metrics.reported_ids()),
        timeframe: candidates.timeframe,
        compare_to: candidates.compare_to,
        granularity: candidates.granularity,
        visualization: candidates.visualization,
        threshold: candidates.threshold,
    };

    let closed = |present: bool| {
        if present {
            SlotStatus::ResolvedSingle
        } else {
            SlotStatus::Absent
        }
    };
    let slot_status: BTreeMap<SlotName, SlotStatus> = SlotName::ALL
        .iter()
        .map(|slot| {
            let status = match slot {
                SlotName::BusinessUnit => business_units.status(),
                SlotName::Metric => metrics.status(),
                SlotName::Timeframe => closed(entities.timeframe.is_some()),
                SlotName::CompareTo => closed(entities.compare_to.is_some()),
                SlotName::Granularity => closed(entities.granularity.is_some()),
                SlotName::Visualization => closed(entities.visualization.is_some()),
                SlotName::Threshold => closed(entities.threshold.is_some()),
            };
            (*slot, status)
        })
        .collect();

    debug!(
        "Resolved business_unit={:?} metric={:?}",
        slot_status.get(&SlotName::BusinessUnit),
        slot_status.get(&SlotName::Metric)
    );

    Resolution {
        entities,
        slot_status,
        business_units,
        metrics,
    }
}
