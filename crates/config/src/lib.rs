//! Configuration loading, validation, and management for Valet.
//!
//! Loads configuration from `~/.valet/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// The root configuration structure.
///
/// Maps directly to `~/.valet/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Assistant behavior settings
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// LLM provider endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (overridable via VALET_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model
    #[serde(default = "default_model")]
    pub model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Assistant identity and prompt settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// The identity block prepended to every system prompt
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Path of the persistent memory notes file
    #[serde(default = "default_memory_file")]
    pub memory_file: PathBuf,
}

/// Background scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the daemon starts the scheduler
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Polling period in seconds
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub database: PathBuf,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_identity() -> String {
    "You are Valet, a careful personal assistant. Use your capabilities when \
     they help; answer directly when they do not."
        .into()
}
fn default_true() -> bool {
    true
}
fn default_tick_secs() -> u64 {
    15
}

fn config_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".valet")
}

fn default_memory_file() -> PathBuf {
    config_dir().join("memory.md")
}

fn default_db_path() -> PathBuf {
    config_dir().join("valet.db")
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            identity: default_identity(),
            memory_file: default_memory_file(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: default_tick_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_db_path(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            assistant: AssistantConfig::default(),
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider.base_url", &self.provider.base_url)
            .field(
                "provider.api_key",
                &self.provider.api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("provider.model", &self.provider.model)
            .field("scheduler", &self.scheduler)
            .field("storage", &self.storage)
            .finish()
    }
}

impl AppConfig {
    /// The default config file path: `~/.valet/config.toml`.
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load from the default path, falling back to defaults when the file
    /// does not exist, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    /// Load from an explicit path (missing file → defaults), then apply
    /// environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str(&raw)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables take precedence over file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("VALET_API_KEY")
            && !key.is_empty()
        {
            self.provider.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("VALET_BASE_URL")
            && !url.is_empty()
        {
            self.provider.base_url = url;
        }
        if let Ok(model) = std::env::var("VALET_MODEL")
            && !model.is_empty()
        {
            self.provider.model = model;
        }
        if let Ok(db) = std::env::var("VALET_DB")
            && !db.is_empty()
        {
            self.storage.database = PathBuf::from(db);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.base_url.is_empty() {
            return Err(ConfigError::Invalid("provider.base_url is empty".into()));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::Invalid(format!(
                "provider.temperature {} out of range 0.0-2.0",
                self.provider.temperature
            )));
        }
        if self.scheduler.tick_secs == 0 {
            return Err(ConfigError::Invalid("scheduler.tick_secs must be > 0".into()));
        }
        Ok(())
    }
}
