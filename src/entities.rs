//! Entity slots and their closed vocabularies
//!
//! Every value that can appear in a final result lives here. Business unit and
//! metric references are newtypes minted only by a taxonomy snapshot, so raw
//! text cannot reach a result through them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical business unit identifier from the taxonomy registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BusinessUnitId(String);

/// Canonical metric identifier from the taxonomy registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MetricId(String);

impl BusinessUnitId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl MetricId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusinessUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A slot that holds one reference or an OR-list of references
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SlotValue<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone + PartialEq> SlotValue<T> {
    /// Builds a slot from distinct values; `None` when empty
    pub fn from_values(values: Vec<T>) -> Option<Self> {
        let mut distinct: Vec<T> = Vec::with_capacity(values.len());
        for v in values {
            if !distinct.contains(&v) {
                distinct.push(v);
            }
        }
        match distinct.len() {
            0 => None,
            1 => distinct.pop().map(SlotValue::One),
            _ => Some(SlotValue::Many(distinct)),
        }
    }

    pub fn values(&self) -> Vec<T> {
        match self {
            SlotValue::One(v) => vec![v.clone()],
            SlotValue::Many(vs) => vs.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SlotValue::One(_) => 1,
            SlotValue::Many(vs) => vs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Closed enumerations share a key representation with their serde form
pub trait Vocabulary: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn key(&self) -> &'static str;

    fn from_key(key: &str) -> Option<Self> {
        let wanted = key.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL.iter().copied().find(|v| v.key() == wanted)
    }

    fn keys() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.key()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativePeriod {
    Today,
    Yesterday,
    #[serde(rename = "past_24_hours")]
    Past24Hours,
    #[serde(rename = "past_7_days")]
    Past7Days,
    #[serde(rename = "past_30_days")]
    Past30Days,
    #[serde(rename = "past_90_days")]
    Past90Days,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    MonthToDate,
    ThisQuarter,
    LastQuarter,
    ThisYear,
    LastYear,
    YearToDate,
}

impl Vocabulary for RelativePeriod {
    const ALL: &'static [Self] = &[
        RelativePeriod::Today,
        RelativePeriod::Yesterday,
        RelativePeriod::Past24Hours,
        RelativePeriod::Past7Days,
        RelativePeriod::Past30Days,
        RelativePeriod::Past90Days,
        RelativePeriod::ThisWeek,
        RelativePeriod::LastWeek,
        RelativePeriod::ThisMonth,
        RelativePeriod::LastMonth,
        RelativePeriod::MonthToDate,
        RelativePeriod::ThisQuarter,
        RelativePeriod::LastQuarter,
        RelativePeriod::ThisYear,
        RelativePeriod::LastYear,
        RelativePeriod::YearToDate,
    ];

    fn key(&self) -> &'static str {
        match self {
            RelativePeriod::Today => "today",
            RelativePeriod::Yesterday => "yesterday",
            RelativePeriod::Past24Hours => "past_24_hours",
            RelativePeriod::Past7Days => "past_7_days",
            RelativePeriod::Past30Days => "past_30_days",
            RelativePeriod::Past90Days => "past_90_days",
            RelativePeriod::ThisWeek => "this_week",
            RelativePeriod::LastWeek => "last_week",
            RelativePeriod::ThisMonth => "this_month",
            RelativePeriod::LastMonth => "last_month",
            RelativePeriod::MonthToDate => "month_to_date",
            RelativePeriod::ThisQuarter => "this_quarter",
            RelativePeriod::LastQuarter => "last_quarter",
            RelativePeriod::ThisYear => "this_year",
            RelativePeriod::LastYear => "last_year",
            RelativePeriod::YearToDate => "year_to_date",
        }
    }
}

/// Comparison baselines. Deliberately disjoint from `RelativePeriod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareTo {
    PreviousPeriod,
    PreviousDay,
    PreviousWeek,
    PreviousMonth,
    PreviousQuarter,
    PreviousYear,
    SameDayLastWeek,
    SameDayLastYear,
    SamePeriodLastYear,
}

impl Vocabulary for CompareTo {
    const ALL: &'static [Self] = &[
        CompareTo::PreviousPeriod,
        CompareTo::PreviousDay,
        CompareTo::PreviousWeek,
        CompareTo::PreviousMonth,
        CompareTo::PreviousQuarter,
        CompareTo::PreviousYear,
        CompareTo::SameDayLastWeek,
        CompareTo::SameDayLastYear,
        CompareTo::SamePeriodLastYear,
    ];

    fn key(&self) -> &'static str {
        match self {
            CompareTo::PreviousPeriod => "previous_period",
            CompareTo::PreviousDay => "previous_day",
            CompareTo::PreviousWeek => "previous_week",
            CompareTo::PreviousMonth => "previous_month",
            CompareTo::PreviousQuarter => "previous_quarter",
            CompareTo::PreviousYear => "previous_year",
            CompareTo::SameDayLastWeek => "same_day_last_week",
            CompareTo::SameDayLastYear => "same_day_last_year",
            CompareTo::SamePeriodLastYear => "same_period_last_year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
}

impl Vocabulary for Granularity {
    const ALL: &'static [Self] = &[
        Granularity::Hour,
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
    ];

    fn key(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visualization {
    Line,
    Bar,
    Area,
    Table,
    Kpi,
}

impl Vocabulary for Visualization {
    const ALL: &'static [Self] = &[
        Visualization::Line,
        Visualization::Bar,
        Visualization::Area,
        Visualization::Table,
        Visualization::Kpi,
    ];

    fn key(&self) -> &'static str {
        match self {
            Visualization::Line => "line",
            Visualization::Bar => "bar",
            Visualization::Area => "area",
            Visualization::Table => "table",
            Visualization::Kpi => "kpi",
        }
    }
}

/// Inclusive calendar range; always `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Reversed bounds are swapped: the intended range is unambiguous
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Relative(RelativePeriod),
    Absolute(DateRange),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdOperator {
    Above,
    AtLeast,
    Below,
    AtMost,
    IncreasesBy,
    DecreasesBy,
}

impl Vocabulary for ThresholdOperator {
    const ALL: &'static [Self] = &[
        ThresholdOperator::Above,
        ThresholdOperator::AtLeast,
        ThresholdOperator::Below,
        ThresholdOperator::AtMost,
        ThresholdOperator::IncreasesBy,
        ThresholdOperator::DecreasesBy,
    ];

    fn key(&self) -> &'static str {
        match self {
            ThresholdOperator::Above => "above",
            ThresholdOperator::AtLeast => "at_least",
            ThresholdOperator::Below => "below",
            ThresholdOperator::AtMost => "at_most",
            ThresholdOperator::IncreasesBy => "increases_by",
            ThresholdOperator::DecreasesBy => "decreases_by",
        }
    }
}

impl ThresholdOperator {
    /// Change operators are evaluated against a comparison baseline
    pub fn is_relative_change(&self) -> bool {
        matches!(self, ThresholdOperator::IncreasesBy | ThresholdOperator::DecreasesBy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Threshold {
    pub operator: ThresholdOperator,
    pub value: f64,
    pub percent: bool,
}

/// Resolved entities. Populated slots hold canonical ids or enumeration values only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityBag {
    pub business_unit: Option<SlotValue<BusinessUnitId>>,
    pub metric: Option<SlotValue<MetricId>>,
    pub timeframe: Option<Timeframe>,
    pub compare_to: Option<CompareTo>,
    pub granularity: Option<Granularity>,
    pub visualization: Option<Visualization>,
    pub threshold: Option<Threshold>,
}

impl EntityBag {
    pub fn business_units(&self) -> Vec<BusinessUnitId> {
        self.business_unit.as_ref().map(|s| s.values()).unwrap_or_default()
    }

    pub fn metrics(&self) -> Vec<MetricId> {
        self.metric.as_ref().map(|s| s.values()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    BusinessUnit,
    Metric,
    Timeframe,
    CompareTo,
    Granularity,
    Visualization,
    Threshold,
}

impl SlotName {
    pub const ALL: [SlotName; 7] = [
        SlotName::BusinessUnit,
        SlotName::Metric,
        SlotName::Timeframe,
        SlotName::CompareTo,
        SlotName::Granularity,
        SlotName::Visualization,
        SlotName::Threshold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotName::BusinessUnit => "business_unit",
            SlotName::Metric => "metric",
            SlotName::Timeframe => "timeframe",
            SlotName::CompareTo => "compare_to",
            SlotName::Granularity => "granularity",
            SlotName::Visualization => "visualization",
            SlotName::Threshold => "threshold",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    ResolvedSingle,
    ResolvedMultiple,
    Unresolved,
    Absent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_swaps_reversed_bounds() {
        let a = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let range = DateRange::new(a, b);
        assert_eq!(range.start(), b);
        assert_eq!(range.end(), a);
    }

    #[test]
    fn test_slot_value_dedupes() {
        let slot = SlotValue::from_values(vec!["a", "a"]).unwrap();
        assert_eq!(slot, SlotValue::One("a"));
        let slot = SlotValue::from_values(vec!["a", "b", "a"]).unwrap();
        assert_eq!(slot.len(), 2);
        assert!(SlotValue::<&str>::from_values(vec![]).is_none());
    }

    #[test]
    fn test_vocabulary_keys_match_serde() {
        for v in Visualization::ALL {
            let json = serde_json::to_value(v).unwrap();
            assert_eq!(json.as_str(), Some(v.key()));
        }
        for p in RelativePeriod::ALL {
            let json = serde_json::to_value(p).unwrap();
            assert_eq!(json.as_str(), Some(p.key()));
        }
        assert_eq!(CompareTo::from_key("Same Period Last Year"), Some(CompareTo::SamePeriodLastYear));
        assert_eq!(Granularity::from_key("fortnight"), None);
    }

    #[test]
    fn test_timeframe_serialization() {
        let tf = Timeframe::Relative(RelativePeriod::LastWeek);
        assert_eq!(serde_json::to_string(&tf).unwrap(), r#"{"relative":"last_week"}"#);
    }
}
