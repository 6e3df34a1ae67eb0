use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::error::DeweyError;

/// Environment variable holding the Azure OpenAI key.
pub const OPENAI_KEY_VAR: &str = "AZURE_OPENAI_API_KEY";
/// Environment variable holding the Azure AI Search query key.
pub const SEARCH_KEY_VAR: &str = "AZURE_SEARCH_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiConfig {
    pub endpoint: String,
    #[serde(default = "default_openai_api_version")]
    pub api_version: String,
    pub chat_deployment: String,
    pub embedding_deployment: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_openai_api_version() -> String {
    "2025-03-01-preview".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub index: String,
    #[serde(default = "default_search_api_version")]
    pub api_version: String,
    #[serde(default = "default_semantic_configuration")]
    pub semantic_configuration: String,
    #[serde(default = "default_vector_field")]
    pub vector_field: String,
    #[serde(default = "default_k_nearest")]
    pub k_nearest: usize,
    #[serde(default = "default_top")]
    pub top: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_api_version() -> String {
    "2024-07-01".to_string()
}
fn default_semantic_configuration() -> String {
    "default".to_string()
}
fn default_vector_field() -> String {
    "content_vector".to_string()
}
fn default_k_nearest() -> usize {
    50
}
fn default_top() -> usize {
    10
}

/// Persona and conversation settings woven into the system instructions.
#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_organization")]
    pub organization: String,
    #[serde(default = "default_home_region")]
    pub home_region: String,
    #[serde(default = "default_archive_start")]
    pub archive_start: String,
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            organization: default_organization(),
            home_region: default_home_region(),
            archive_start: default_archive_start(),
            max_history_turns: default_max_history_turns(),
        }
    }
}

fn default_name() -> String {
    "Dewey".to_string()
}
fn default_organization() -> String {
    "The Philadelphia Inquirer".to_string()
}
fn default_home_region() -> String {
    "Greater Philadelphia".to_string()
}
fn default_archive_start() -> String {
    "January 2, 1978".to_string()
}
fn default_max_history_turns() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

impl Config {
    /// A fully-defaulted config pointing at placeholder endpoints.
    pub fn minimal() -> Self {
        Self {
            openai: OpenAiConfig {
                endpoint: "https://example.openai.azure.com".to_string(),
                api_version: default_openai_api_version(),
                chat_deployment: "gpt-4o".to_string(),
                embedding_deployment: "text-embedding-3-large".to_string(),
                timeout_secs: default_timeout_secs(),
            },
            search: SearchConfig {
                endpoint: "https://example.search.windows.net".to_string(),
                index: "articles".to_string(),
                api_version: default_search_api_version(),
                semantic_configuration: default_semantic_configuration(),
                vector_field: default_vector_field(),
                k_nearest: default_k_nearest(),
                top: default_top(),
                timeout_secs: default_timeout_secs(),
            },
            assistant: AssistantConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Check value ranges after parsing.
    pub fn validate(&self) -> Result<(), DeweyError> {
        if self.openai.endpoint.trim().is_empty() {
            return Err(DeweyError::Configuration(
                "openai.endpoint must not be empty".into(),
            ));
        }
        if self.openai.chat_deployment.trim().is_empty()
            || self.openai.embedding_deployment.trim().is_empty()
        {
            return Err(DeweyError::Configuration(
                "openai.chat_deployment and openai.embedding_deployment are required".into(),
            ));
        }
        if self.search.endpoint.trim().is_empty() || self.search.index.trim().is_empty() {
            return Err(DeweyError::Configuration(
                "search.endpoint and search.index are required".into(),
            ));
        }
        if self.search.top < 1 {
            return Err(DeweyError::Configuration("search.top must be >= 1".into()));
        }
        if self.search.k_nearest < self.search.top {
            return Err(DeweyError::Configuration(
                "search.k_nearest must be >= search.top".into(),
            ));
        }
        if self.assistant.max_history_turns == 0 {
            return Err(DeweyError::Configuration(
                "assistant.max_history_turns must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Read a secret from the environment, treating blank values as missing.
pub fn require_secret(var: &str) -> Result<String, DeweyError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(DeweyError::Configuration(format!(
            "{} environment variable not set",
            var
        ))),
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
