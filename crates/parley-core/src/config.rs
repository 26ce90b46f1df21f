//! User configuration (`~/.parley/config.toml`)
//!
//! ```toml
//! provider = "anthropic"
//! model = "claude-sonnet-4-5"
//! max_tokens = 8192
//!
//! [context]
//! policy = "rolling"   # or "halt"
//! budget = 100000      # defaults to the model's context window
//!
//! [tools]
//! disabled = ["bash"]
//! auto_approve = ["read_file"]
//!
//! [hooks]
//! timestamp = true     # prefix prompts with the local time
//! redact = ["hunter2"] # masked in streamed output
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::agent::budget::TruncationPolicy;
use crate::ai::models::ModelMetadata;
use crate::ai::providers::{ProviderConfig, ProviderId};
use crate::constants;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no API key for {provider}: set {var}")]
    MissingApiKey { provider: ProviderId, var: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub policy: TruncationPolicy,
    /// Token budget; `None` uses the model's context window
    pub budget: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub disabled: Vec<String>,
    pub auto_approve: Vec<String>,
}

/// Built-in message hooks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub timestamp: bool,
    pub redact: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderId,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub max_tokens: usize,
    pub working_directory: Option<PathBuf>,
    pub context: ContextConfig,
    pub tools: ToolsConfig,
    pub hooks: HooksConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderId::default(),
            model: None,
            base_url: None,
            api_key_env: None,
            max_tokens: constants::ai::MAX_OUTPUT_TOKENS,
            working_directory: None,
            context: ContextConfig::default(),
            tools: ToolsConfig::default(),
            hooks: HooksConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Built-in provider settings with this config's overrides applied
    pub fn provider_config(&self) -> ProviderConfig {
        let mut provider = ProviderConfig::builtin(self.provider);
        if let Some(base_url) = &self.base_url {
            provider.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(var) = &self.api_key_env {
            provider.api_key_env = Some(var.clone());
        }
        provider
    }

    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| ProviderConfig::builtin(self.provider).default_model)
    }

    /// Token budget for outbound requests
    pub fn context_budget(&self) -> usize {
        self.context
            .budget
            .unwrap_or_else(|| ModelMetadata::lookup(self.provider, &self.model()).context_window)
    }

    pub fn working_directory(&self) -> PathBuf {
        self.working_directory
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Read the API key from the provider's environment variable
    ///
    /// Providers without authentication resolve to `None`.
    pub fn resolve_api_key(&self) -> Result<Option<String>, ConfigError> {
        let provider = self.provider_config();
        if !provider.requires_api_key() {
            return Ok(None);
        }
        let Some(var) = provider.api_key_env else {
            return Ok(None);
        };
        match std::env::var(&var) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key.trim().to_string())),
            _ => Err(ConfigError::MissingApiKey {
                provider: self.provider,
                var,
            }),
        }
    }
}
