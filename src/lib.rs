//! Natural-language command interpretation for a business-operations dashboard.
//!
//! Utterances in English or Bengali become a classified intent, canonical
//! entities from the taxonomy registry, planned actions and, when needed,
//! clarification questions. See [`interpreter::Interpreter`].

pub mod assembler;
pub mod clarification;
pub mod config;
pub mod entities;
pub mod error;
pub mod extractor;
pub mod intent;
pub mod interpreter;
pub mod llm;
pub mod normalizer;
pub mod planner;
pub mod resolver;
pub mod taxonomy;
pub mod time;

pub use assembler::InterpretationResult;
pub use config::InterpreterConfig;
pub use error::{InterpretError, Result};
pub use interpreter::{InterpretRequest, Interpreter};
pub use taxonomy::{TaxonomyCatalog, TaxonomyRegistry};
