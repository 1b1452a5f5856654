// ⚙️ Configuration - classifier settings from env and/or a JSON file
//
// Precedence: defaults < JSON file < environment.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidVar {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the semantic-intent classifier call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// OpenAI-compatible chat completions URL
    pub endpoint: String,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub model: String,

    pub temperature: f32,

    /// Transport timeout for the single attempt
    pub timeout_secs: u64,

    /// Categories the classifier is asked to pick from
    pub known_categories: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            timeout_secs: 30,
            known_categories: default_categories(),
        }
    }
}

fn default_categories() -> Vec<String> {
    [
        "Alimentação",
        "Mercado",
        "Transporte",
        "Moradia",
        "Contas",
        "Saúde",
        "Educação",
        "Lazer",
        "Compras",
        "Salário",
        "Vendas",
        "Investimentos",
        "Outros",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

impl ClassifierConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        let mut config = ClassifierConfig::default();
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Load a JSON config file, then apply environment overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: ClassifierConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config JSON: {}", path.display()))?;

        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (empty values are ignored)
    pub fn apply_env<F>(&mut self, lookup: F) -> std::result::Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.model = model;
        }
        if let Some(endpoint) = get("LUME_LLM_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(raw) = get("LUME_LLM_TEMPERATURE") {
            self.temperature = raw.parse().map_err(|e: std::num::ParseFloatError| {
                ConfigError::InvalidVar {
                    var: "LUME_LLM_TEMPERATURE",
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(raw) = get("LUME_LLM_TIMEOUT_SECS") {
            self.timeout_secs = raw.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidVar {
                    var: "LUME_LLM_TIMEOUT_SECS",
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        Ok(())
    }
}
