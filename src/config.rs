//! Interpreter configuration
//!
//! Defaults, optionally overlaid by a JSON file and then by environment
//! variables (a `.env` file is honoured by the binary through `dotenv`).

use crate::error::{InterpretError, Result};
use crate::normalizer::Language;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Display language used when the utterance carries no script signal
    pub default_language: Language,

    /// Confidence below this is not reliable and triggers a generic followup
    pub reliable_threshold: f64,

    /// Candidates within this score delta of the top match are tied
    pub tie_delta: f64,

    /// Largest edit distance accepted by the fuzzy matching stage
    pub fuzzy_max_distance: usize,

    /// Upper bound on options attached to an ambiguity followup
    pub max_followup_options: usize,

    /// Bound on any single external provider call
    pub provider_timeout_ms: u64,

    pub provider: ProviderConfig,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            default_language: Language::En,
            reliable_threshold: 0.6,
            tie_delta: 0.05,
            fuzzy_max_distance: 2,
            max_followup_options: 5,
            provider_timeout_ms: 3000,
            provider: ProviderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl InterpreterConfig {
    /// Defaults overlaid with environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// JSON file overlaid with environment variables
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_json::from_str(&content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(lang) = env::var("INTERPRETER_DEFAULT_LANG") {
            self.default_language = Language::from_code(&lang).ok_or_else(|| {
                InterpretError::Config(format!("Unsupported INTERPRETER_DEFAULT_LANG '{}'", lang))
            })?;
        }
        if let Some(v) = parse_env::<f64>("INTERPRETER_RELIABLE_THRESHOLD")? {
            self.reliable_threshold = v;
        }
        if let Some(v) = parse_env::<f64>("INTERPRETER_TIE_DELTA")? {
            self.tie_delta = v;
        }
        if let Some(v) = parse_env::<u64>("INTERPRETER_PROVIDER_TIMEOUT_MS")? {
            self.provider_timeout_ms = v;
        }
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.provider.api_key = Some(key);
            }
        }
        if let Ok(model) = env::var("OPENAI_MODEL") {
            self.provider.model = model;
        }
        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            self.provider.base_url = base_url;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.reliable_threshold) {
            return Err(InterpretError::Config(format!(
                "reliable_threshold must be within [0,1], got {}",
                self.reliable_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.tie_delta) {
            return Err(InterpretError::Config(format!(
                "tie_delta must be within [0,1], got {}",
                self.tie_delta
            )));
        }
        if self.max_followup_options == 0 {
            return Err(InterpretError::Config(
                "max_followup_options must be at least 1".to_string(),
            ));
        }
        if self.provider_timeout_ms == 0 {
            return Err(InterpretError::Config(
                "provider_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| InterpretError::Config(format!("Invalid value for {}: '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}
