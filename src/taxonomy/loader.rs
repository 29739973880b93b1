//! Taxonomy Catalog Loader
//!
//! Reads the business-unit/metric catalog exported by the record layer, either
//! as JSON (`TaxonomyCatalog` shape) or as CSV with the header
//! `kind,id,name,synonyms,category,unit` (synonyms separated by `|`).

use crate::entities::{Visualization, Vocabulary};
use crate::error::{InterpretError, Result};
use crate::taxonomy::registry::{TaxonomyCatalog, TaxonomyEntry};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct CatalogRow {
    kind: String,
    id: String,
    name: String,
    #[serde(default)]
    synonyms: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    unit: Option<String>,
}

/// Load a catalog, picking the format from the file extension
pub fn load_catalog(path: impl AsRef<Path>) -> Result<TaxonomyCatalog> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    debug!("Loading taxonomy catalog from {}", path.display());
    match extension.as_str() {
        "json" => load_from_json(&std::fs::read_to_string(path)?),
        "csv" => load_from_csv(std::fs::File::open(path)?),
        other => Err(InterpretError::Taxonomy(format!(
            "Unsupported catalog format '{}' for {}",
            other,
            path.display()
        ))),
    }
}

pub fn load_from_json(json_str: &str) -> Result<TaxonomyCatalog> {
    serde_json::from_str(json_str)
        .map_err(|e| InterpretError::Taxonomy(format!("Failed to parse taxonomy JSON: {}", e)))
}

pub fn load_from_csv<R: std::io::Read>(reader: R) -> Result<TaxonomyCatalog> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut catalog = TaxonomyCatalog::default();

    for (line, row) in csv_reader.deserialize::<CatalogRow>().enumerate() {
        let row = row?;
        let synonyms: Vec<String> = row
            .synonyms
            .as_deref()
            .unwrap_or("")
            .split('|')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        match row.kind.trim().to_lowercase().as_str() {
            "business_unit" | "unit" => catalog.business_units.push(TaxonomyEntry {
                id: row.id,
                name: row.name,
                synonyms,
                category: non_empty(row.category),
                unit: None,
            }),
            "metric" => catalog.metrics.push(TaxonomyEntry {
                id: row.id,
                name: row.name,
                synonyms,
                category: non_empty(row.category),
                unit: non_empty(row.unit),
            }),
            "visualization" => {
                let kind = Visualization::from_key(&row.id).ok_or_else(|| {
                    InterpretError::Taxonomy(format!(
                        "Row {}: unknown visualization '{}', expected one of {:?}",
                        line + 2,
                        row.id,
                        Visualization::keys()
                    ))
                })?;
                for alias in std::iter::once(row.name).chain(synonyms) {
                    catalog.visualizations.insert(alias, kind);
                }
            }
            other => {
                return Err(InterpretError::Taxonomy(format!(
                    "Row {}: unknown entry kind '{}'",
                    line + 2,
                    other
                )))
            }
        }
    }

    Ok(catalog)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "kind,id,name,synonyms,category,unit
business_unit,setu_filling_station,Setu Filling Station,setu pump|সেতু পাম্প,fuel,
metric,fuel_stock,Fuel Stock,fuel inventory,fuel,litres
visualization,kpi,scorecard,big number,,
";

    #[test]
    fn test_load_from_csv() {
        let catalog = load_from_csv(CSV.as_bytes()).unwrap();
        assert_eq!(catalog.business_units.len(), 1);
        assert_eq!(catalog.business_units[0].synonyms, vec!["setu pump", "সেতু পাম্প"]);
        assert_eq!(catalog.metrics[0].unit.as_deref(), Some("litres"));
        assert_eq!(catalog.business_units[0].unit, None);
        assert_eq!(catalog.visualizations.get("big number"), Some(&Visualization::Kpi));
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let csv = "kind,id,name,synonyms,category,unit\nwarehouse,w1,Main,,,\n";
        assert!(matches!(load_from_csv(csv.as_bytes()), Err(InterpretError::Taxonomy(_))));
    }

    #[test]
    fn test_load_catalog_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"business_units":[{{"id":"rupa_pharmacy","name":"Rupa Pharmacy"}}],"metrics":[]}}"#
        )
        .unwrap();
        let catalog = load_catalog(file.path()).unwrap();
        assert_eq!(catalog.business_units[0].id, "rupa_pharmacy");
        assert!(catalog.visualizations.is_empty());

        let other = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(load_catalog(other.path()).is_err());
    }
}
