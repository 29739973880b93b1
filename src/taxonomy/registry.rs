//! Taxonomy Registry
//!
//! A `TaxonomySnapshot` is the immutable, versioned view of the business units,
//! metrics and visualization aliases a request resolves against. The
//! `TaxonomyRegistry` handle owns the live snapshot and swaps it atomically on
//! reload; requests hold an `Arc` to the snapshot they started with.

use crate::config::InterpreterConfig;
use crate::entities::{BusinessUnitId, MetricId, Visualization, Vocabulary};
use crate::error::{InterpretError, Result};
use crate::taxonomy::loader::load_catalog;
use crate::taxonomy::matcher::{normalize_term, MatchKind, TermMatcher, EXACT_SCORE, SYNONYM_SCORE};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::info;

/// One business unit or metric as exported by the record layer's catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxonomyEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Module the entry belongs to (fuel, pharmacy, payroll, ...)
    #[serde(default)]
    pub category: Option<String>,
    /// Unit of measure, metrics only
    #[serde(default)]
    pub unit: Option<String>,
}

/// Catalog file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonomyCatalog {
    pub business_units: Vec<TaxonomyEntry>,
    pub metrics: Vec<TaxonomyEntry>,
    /// Extra words that name a visualization kind, e.g. "scorecard" -> kpi
    #[serde(default)]
    pub visualizations: BTreeMap<String, Visualization>,
}

/// Which vocabulary a surface form belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    BusinessUnit,
    Metric,
}

/// A ranked lookup candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonomyMatch<I> {
    pub id: I,
    pub name: String,
    pub kind: MatchKind,
    pub score: f64,
}

#[derive(Debug, Clone)]
struct IndexedEntry {
    entry: TaxonomyEntry,
    norm_id: String,
    norm_name: String,
    norm_synonyms: Vec<String>,
}

impl IndexedEntry {
    fn new(entry: TaxonomyEntry) -> Self {
        Self {
            norm_id: normalize_term(&entry.id),
            norm_name: normalize_term(&entry.name),
            norm_synonyms: entry
                .synonyms
                .iter()
                .map(|s| normalize_term(s))
                .filter(|s| !s.is_empty())
                .collect(),
            entry,
        }
    }

    fn surfaces(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.norm_name).chain(self.norm_synonyms.iter())
    }
}

/// Immutable registry view
#[derive(Debug, Clone)]
pub struct TaxonomySnapshot {
    version: u64,
    business_units: Vec<IndexedEntry>,
    metrics: Vec<IndexedEntry>,
    visualizations: BTreeMap<String, Visualization>,
    matcher: TermMatcher,
    tie_delta: f64,
}

impl TaxonomySnapshot {
    pub fn from_catalog(catalog: TaxonomyCatalog, version: u64, config: &InterpreterConfig) -> Result<Self> {
        validate_entries("business unit", &catalog.business_units)?;
        validate_entries("metric", &catalog.metrics)?;

        let mut visualizations: BTreeMap<String, Visualization> = Visualization::ALL
            .iter()
            .map(|v| (v.key().to_string(), *v))
            .collect();
        for (alias, kind) in catalog.visualizations {
            let alias = normalize_term(&alias);
            if !alias.is_empty() {
                visualizations.insert(alias, kind);
            }
        }

        Ok(Self {
            version,
            business_units: catalog.business_units.into_iter().map(IndexedEntry::new).collect(),
            metrics: catalog.metrics.into_iter().map(IndexedEntry::new).collect(),
            visualizations,
            matcher: TermMatcher::new(config.fuzzy_max_distance),
            tie_delta: config.tie_delta,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tie_delta(&self) -> f64 {
        self.tie_delta
    }

    pub fn lookup_business_unit(&self, text: &str) -> Vec<TaxonomyMatch<BusinessUnitId>> {
        self.lookup(&self.business_units, text)
            .into_iter()
            .map(|(e, kind, score)| TaxonomyMatch {
                id: BusinessUnitId::new(e.entry.id.clone()),
                name: e.entry.name.clone(),
                kind,
                score,
            })
            .collect()
    }

    pub fn lookup_metric(&self, text: &str) -> Vec<TaxonomyMatch<MetricId>> {
        self.lookup(&self.metrics, text)
            .into_iter()
            .map(|(e, kind, score)| TaxonomyMatch {
                id: MetricId::new(e.entry.id.clone()),
                name: e.entry.name.clone(),
                kind,
                score,
            })
            .collect()
    }

    /// Strongest lookup score for a span in each vocabulary
    pub fn best_scores(&self, text: &str) -> (Option<f64>, Option<f64>) {
        let bu = self.lookup(&self.business_units, text).first().map(|m| m.2);
        let metric = self.lookup(&self.metrics, text).first().map(|m| m.2);
        (bu, metric)
    }

    /// Every normalized name and synonym, longest first
    pub fn surface_forms(&self) -> Vec<(String, TermKind)> {
        let mut forms: Vec<(String, TermKind)> = Vec::new();
        let mut seen: HashSet<(String, TermKind)> = HashSet::new();
        for (entries, kind) in [
            (&self.business_units, TermKind::BusinessUnit),
            (&self.metrics, TermKind::Metric),
        ] {
            for e in entries {
                for s in e.surfaces() {
                    if seen.insert((s.clone(), kind)) {
                        forms.push((s.clone(), kind));
                    }
                }
            }
        }
        forms.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });
        forms
    }

    /// Visualization aliases (built-in keys plus catalog extras), normalized
    pub fn visualization_aliases(&self) -> &BTreeMap<String, Visualization> {
        &self.visualizations
    }

    pub fn has_business_unit(&self, id: &BusinessUnitId) -> bool {
        self.business_units.iter().any(|e| e.entry.id == id.as_str())
    }

    pub fn has_metric(&self, id: &MetricId) -> bool {
        self.metrics.iter().any(|e| e.entry.id == id.as_str())
    }

    pub fn business_unit_name(&self, id: &BusinessUnitId) -> Option<&str> {
        self.business_units
            .iter()
            .find(|e| e.entry.id == id.as_str())
            .map(|e| e.entry.name.as_str())
    }

    pub fn metric_entry(&self, id: &MetricId) -> Option<&TaxonomyEntry> {
        self.metrics.iter().find(|e| e.entry.id == id.as_str()).map(|e| &e.entry)
    }

    /// Display names in catalog order
    pub fn business_unit_names(&self) -> Vec<String> {
        self.business_units.iter().map(|e| e.entry.name.clone()).collect()
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|e| e.entry.name.clone()).collect()
    }

    pub fn business_unit_count(&self) -> usize {
        self.business_units.len()
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Matching policy: exact name/id, then synonym, then containment, then
    /// fuzzy. The first stage with any hit wins.
    fn lookup<'a>(&self, entries: &'a [IndexedEntry], text: &str) -> Vec<(&'a IndexedEntry, MatchKind, f64)> {
        let q = normalize_term(text);
        if q.is_empty() {
            return Vec::new();
        }

        let exact: Vec<_> = entries
            .iter()
            .filter(|e| e.norm_name == q || e.norm_id == q)
            .map(|e| (e, MatchKind::Exact, EXACT_SCORE))
            .collect();
        if !exact.is_empty() {
            return ranked(exact);
        }

        let synonym: Vec<_> = entries
            .iter()
            .filter(|e| e.norm_synonyms.iter().any(|s| *s == q))
            .map(|e| (e, MatchKind::Synonym, SYNONYM_SCORE))
            .collect();
        if !synonym.is_empty() {
            return ranked(synonym);
        }

        let partial: Vec<_> = entries
            .iter()
            .filter_map(|e| {
                best(e.surfaces().filter_map(|s| self.matcher.partial_score(&q, s)))
                    .map(|score| (e, MatchKind::Partial, score))
            })
            .collect();
        if !partial.is_empty() {
            return ranked(partial);
        }

        let fuzzy: Vec<_> = entries
            .iter()
            .filter_map(|e| {
                best(e.surfaces().filter_map(|s| self.matcher.fuzzy_score(&q, s)))
                    .map(|score| (e, MatchKind::Fuzzy, score))
            })
            .collect();
        ranked(fuzzy)
    }
}

/// Candidates within `delta` of the top score
pub fn tied<I>(matches: &[TaxonomyMatch<I>], delta: f64) -> &[TaxonomyMatch<I>] {
    let Some(top) = matches.first() else {
        return matches;
    };
    let count = matches
        .iter()
        .take_while(|m| top.score - m.score <= delta + f64::EPSILON)
        .count();
    &matches[..count]
}

fn best(scores: impl Iterator<Item = f64>) -> Option<f64> {
    scores.fold(None, |acc, s| match acc {
        Some(a) if a >= s => Some(a),
        _ => Some(s),
    })
}

fn ranked(mut hits: Vec<(&IndexedEntry, MatchKind, f64)>) -> Vec<(&IndexedEntry, MatchKind, f64)> {
    hits.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.entry.name.cmp(&b.0.entry.name))
            .then_with(|| a.0.entry.id.cmp(&b.0.entry.id))
    });
    hits
}

fn validate_entries(label: &str, entries: &[TaxonomyEntry]) -> Result<()> {
    let mut ids = HashSet::new();
    let names: HashSet<String> = entries.iter().map(|e| normalize_term(&e.name)).collect();

    for entry in entries {
        if entry.id.trim().is_empty() || normalize_term(&entry.name).is_empty() {
            return Err(InterpretError::Taxonomy(format!(
                "{} entry with empty id or name: {:?}",
                label, entry
            )));
        }
        if !ids.insert(entry.id.as_str()) {
            return Err(InterpretError::Taxonomy(format!(
                "Duplicate {} id '{}'",
                label, entry.id
            )));
        }
        let own_name = normalize_term(&entry.name);
        for synonym in &entry.synonyms {
            let s = normalize_term(synonym);
            if s != own_name && names.contains(&s) {
                return Err(InterpretError::Taxonomy(format!(
                    "{} synonym '{}' of '{}' collides with another entry's name",
                    label, synonym, entry.id
                )));
            }
        }
    }
    Ok(())
}

/// Process-wide handle to the live snapshot
pub struct TaxonomyRegistry {
    current: RwLock<Arc<TaxonomySnapshot>>,
    config: InterpreterConfig,
}

impl TaxonomyRegistry {
    pub fn new(catalog: TaxonomyCatalog, config: &InterpreterConfig) -> Result<Self> {
        let snapshot = TaxonomySnapshot::from_catalog(catalog, 1, config)?;
        info!(
            "📚 Taxonomy loaded: {} business units, {} metrics (version {})",
            snapshot.business_unit_count(),
            snapshot.metric_count(),
            snapshot.version()
        );
        Ok(Self {
            current: RwLock::new(Arc::new(snapshot)),
            config: config.clone(),
        })
    }

    pub fn load(path: impl AsRef<Path>, config: &InterpreterConfig) -> Result<Self> {
        Self::new(load_catalog(path)?, config)
    }

    /// The snapshot in-flight work should hold for its whole lifetime
    pub fn snapshot(&self) -> Arc<TaxonomySnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Build a new snapshot off to the side, then swap it in. On error the
    /// live snapshot is untouched.
    pub fn replace(&self, catalog: TaxonomyCatalog) -> Result<u64> {
        let mut snapshot = TaxonomySnapshot::from_catalog(catalog, 0, &self.config)?;

        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        // Numbered under the lock so concurrent reloads stay strictly increasing
        snapshot.version = guard.version() + 1;
        let version = snapshot.version;
        *guard = Arc::new(snapshot);
        drop(guard);

        info!("🔄 Taxonomy replaced, now at version {}", version);
        Ok(version)
    }

    pub fn reload_from_path(&self, path: impl AsRef<Path>) -> Result<u64> {
        let catalog = load_catalog(path)?;
        self.replace(catalog)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn entry(id: &str, name: &str, synonyms: &[&str]) -> TaxonomyEntry {
        TaxonomyEntry {
            id: id.to_string(),
            name: name.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            category: None,
            unit: None,
        }
    }

    pub(crate) fn sample_catalog() -> TaxonomyCatalog {
        TaxonomyCatalog {
            business_units: vec![
                entry("setu_filling_station", "Setu Filling Station", &["setu pump", "সেতু পাম্প"]),
                entry("setu_fuel_north", "Setu Fuel North", &[]),
                entry("setu_fuel_south", "Setu Fuel South", &[]),
                entry("rupa_pharmacy", "Rupa Pharmacy", &["rupa drugs"]),
                entry("dhanmondi_rentals", "Dhanmondi Rentals", &[]),
            ],
            metrics: vec![
                entry("fuel_stock", "Fuel Stock", &["fuel inventory", "tank level"]),
                entry("sales", "Sales", &["revenue", "বিক্রি"]),
                entry("rent_collected", "Rent Collected", &["rent collection"]),
                entry("payroll_cost", "Payroll Cost", &["salary cost"]),
            ],
            visualizations: BTreeMap::from([("scorecard".to_string(), Visualization::Kpi)]),
        }
    }

    pub(crate) fn sample_snapshot() -> TaxonomySnapshot {
        TaxonomySnapshot::from_catalog(sample_catalog(), 1, &InterpreterConfig::default()).unwrap()
    }

    #[test]
    fn test_exact_name_match() {
        let snapshot = sample_snapshot();
        let matches = snapshot.lookup_business_unit("setu filling station");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id.as_str(), "setu_filling_station");
        assert_eq!(matches[0].kind, MatchKind::Exact);
    }

    #[test]
    fn test_synonym_resolves_to_canonical() {
        let snapshot = sample_snapshot();
        let by_name = snapshot.lookup_metric("Sales");
        let by_synonym = snapshot.lookup_metric("revenue");
        assert_eq!(by_name[0].id, by_synonym[0].id);
        assert_eq!(by_synonym[0].kind, MatchKind::Synonym);
    }

    #[test]
    fn test_partial_match_ties() {
        let snapshot = sample_snapshot();
        let matches = snapshot.lookup_business_unit("setu fuel");
        let tied_matches = tied(&matches, snapshot.tie_delta());
        let ids: Vec<&str> = tied_matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["setu_fuel_north", "setu_fuel_south"]);
    }

    #[test]
    fn test_fuzzy_match() {
        let snapshot = sample_snapshot();
        let matches = snapshot.lookup_business_unit("Rupa Pharmcy");
        assert_eq!(matches[0].id.as_str(), "rupa_pharmacy");
        assert_eq!(matches[0].kind, MatchKind::Fuzzy);
    }

    #[test]
    fn test_unknown_term() {
        let snapshot = sample_snapshot();
        assert!(snapshot.lookup_metric("happiness index").is_empty());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut catalog = sample_catalog();
        catalog.metrics.push(entry("sales", "Gross Sales", &[]));
        let err = TaxonomySnapshot::from_catalog(catalog, 1, &InterpreterConfig::default());
        assert!(matches!(err, Err(InterpretError::Taxonomy(_))));
    }

    #[test]
    fn test_replace_keeps_old_snapshot_alive() {
        let registry = TaxonomyRegistry::new(sample_catalog(), &InterpreterConfig::default()).unwrap();
        let before = registry.snapshot();

        let mut catalog = sample_catalog();
        catalog.metrics.push(entry("footfall", "Footfall", &[]));
        let version = registry.replace(catalog).unwrap();

        assert_eq!(version, 2);
        assert_eq!(before.version(), 1);
        assert!(before.lookup_metric("footfall").is_empty());
        assert_eq!(registry.snapshot().lookup_metric("footfall").len(), 1);
    }

    #[test]
    fn test_failed_replace_leaves_live_snapshot() {
        let registry = TaxonomyRegistry::new(sample_catalog(), &InterpreterConfig::default()).unwrap();
        let mut catalog = sample_catalog();
        catalog.business_units.push(entry("", "Nameless", &[]));
        assert!(registry.replace(catalog).is_err());
        assert_eq!(registry.snapshot().version(), 1);
    }
}
