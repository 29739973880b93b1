use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InterpretError {
    #[error("Taxonomy error: {0}")]
    Taxonomy(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Contract violation: {}", .0.join("; "))]
    Contract(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, InterpretError>;
