//! Taxonomy Registry: the closed vocabulary of business units and metrics

pub mod loader;
pub mod matcher;
pub mod registry;

pub use loader::load_catalog;
pub use matcher::MatchKind;
pub use registry::{
    tied, TaxonomyCatalog, TaxonomyEntry, TaxonomyMatch, TaxonomyRegistry, TaxonomySnapshot, TermKind,
};
