//! Configuration management for Parley
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::completion::catalog::{builtin_models, ModelSpec};
use crate::error::{Result, ParleyError};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for Parley
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API connection and retry settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Default request settings for chat turns
    #[serde(default)]
    pub chat: ChatConfig,
    /// Conversation history location
    #[serde(default)]
    pub storage: StorageConfig,
    /// Capability table; empty means the built-in table
    #[serde(default)]
    pub models: Vec<ModelSpec>,
}

/// Remote chat-completion API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; usually supplied through `OPENAI_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Total attempts per completion call (including the first)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base wait after a generic API error (multiplied by the attempt number)
    #[serde(default = "default_api_error_backoff_ms")]
    pub api_error_backoff_ms: u64,

    /// Base wait after a rate-limit response (multiplied by the attempt number)
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,

    /// Base wait after an unclassified failure (multiplied by the attempt number)
    #[serde(default = "default_unexpected_error_backoff_ms")]
    pub unexpected_error_backoff_ms: u64,

    /// Treat an empty response body as transient instead of failing at once
    #[serde(default)]
    pub retry_empty_response: bool,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_api_error_backoff_ms() -> u64 {
    1000
}

fn default_rate_limit_backoff_ms() -> u64 {
    2000
}

fn default_unexpected_error_backoff_ms() -> u64 {
    1000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            api_error_backoff_ms: default_api_error_backoff_ms(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            unexpected_error_backoff_ms: default_unexpected_error_backoff_ms(),
            retry_empty_response: false,
        }
    }
}

impl ApiConfig {
    /// Per-request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// What to do when a request names a model missing from the capability table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownModelPolicy {
    /// Substitute the default model and log a warning
    #[default]
    Fallback,
    /// Fail the call without contacting the API
    Reject,
}

/// Default request settings for chat turns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Model used when none is requested, and the fallback for unknown models
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature, 0.0 to 2.0
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Requested response length in tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Optional system prompt sent ahead of every user turn
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Longest accepted user message, in characters
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Handling of unknown model ids
    #[serde(default)]
    pub unknown_model: UnknownModelPolicy,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_max_message_length() -> usize {
    4000
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
            max_message_length: default_max_message_length(),
            unknown_model: UnknownModelPolicy::default(),
        }
    }
}

/// Conversation history location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for conversation records; platform data dir when unset
    #[serde(default)]
    pub history_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(ParleyError::Io)
            .with_context(|| format!("Failed to read config file {}", path))?;

        serde_yaml::from_str(&contents)
            .map_err(ParleyError::Yaml)
            .with_context(|| format!("Failed to parse config file {}", path))
    }

    fn apply_env_vars(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.api.api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("PARLEY_API_KEY") {
            if !key.trim().is_empty() {
                self.api.api_key = Some(key);
            }
        }

        if let Ok(base_url) = std::env::var("PARLEY_API_BASE") {
            self.api.base_url = base_url;
        }

        if let Ok(model) = std::env::var("PARLEY_MODEL") {
            self.chat.default_model = model;
        }

        if let Ok(retries) = std::env::var("PARLEY_MAX_RETRIES") {
            if let Ok(value) = retries.parse() {
                self.api.max_retries = value;
            } else {
                tracing::warn!("Invalid PARLEY_MAX_RETRIES: {}", retries);
            }
        }

        if let Ok(timeout) = std::env::var("PARLEY_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.api.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid PARLEY_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(max_len) = std::env::var("PARLEY_MAX_MESSAGE_LENGTH") {
            if let Ok(value) = max_len.parse() {
                self.chat.max_message_length = value;
            } else {
                tracing::warn!("Invalid PARLEY_MAX_MESSAGE_LENGTH: {}", max_len);
            }
        }

        if let Ok(dir) = std::env::var(crate::storage::HISTORY_DIR_ENV) {
            self.storage.history_dir = Some(PathBuf::from(dir));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(dir) = &cli.storage_dir {
            tracing::debug!("Using history directory override from CLI: {}", dir.display());
            self.storage.history_dir = Some(dir.clone());
        }
    }

    /// Capability table in effect (configured entries or the built-in set)
    pub fn model_table(&self) -> Vec<ModelSpec> {
        if self.models.is_empty() {
            builtin_models()
        } else {
            self.models.clone()
        }
    }

    /// Required settings that are absent
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self
            .api
            .api_key
            .as_deref()
            .map_or(true, |k| k.trim().is_empty())
        {
            missing.push("OPENAI_API_KEY");
        }
        missing
    }

    /// Fail when settings needed to reach the API are missing
    pub fn validate_credentials(&self) -> Result<()> {
        let missing = self.missing_required();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ParleyError::Config(format!(
                "Missing required configuration: {}",
                missing.join(", ")
            ))
            .into())
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges and
    /// that the default model exists in the capability table. Credentials
    /// are checked separately by [`Config::validate_credentials`].
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(ParleyError::Config("api.base_url cannot be empty".to_string()).into());
        }

        if self.api.max_retries == 0 {
            return Err(
                ParleyError::Config("api.max_retries must be greater than 0".to_string()).into(),
            );
        }

        if self.api.timeout_seconds == 0 {
            return Err(ParleyError::Config(
                "api.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.chat.max_message_length == 0 {
            return Err(ParleyError::Config(
                "chat.max_message_length must be greater than 0".to_string(),
            )
            .into());
        }

        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(ParleyError::Config(
                "chat.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if self.chat.default_model.trim().is_empty() {
            return Err(
                ParleyError::Config("chat.default_model cannot be empty".to_string()).into(),
            );
        }

        let table = self.model_table();
        let mut seen = HashSet::new();
        for model in &table {
            if !seen.insert(model.id.as_str()) {
                return Err(ParleyError::Config(format!(
                    "Duplicate model id in models table: {}",
                    model.id
                ))
                .into());
            }
            if model.max_tokens == 0 {
                return Err(ParleyError::Config(format!(
                    "Model {} must allow at least one token",
                    model.id
                ))
                .into());
            }
        }

        if !seen.contains(self.chat.default_model.as_str()) {
            return Err(ParleyError::Config(format!(
                "Default model {} is not in the models table",
                self.chat.default_model
            ))
            .into());
        }

        Ok(())
    }
}
