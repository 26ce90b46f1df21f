//! AI provider configuration
//!
//! Defines provider types and the built-in provider registry: where each
//! vendor lives, how it authenticates, and which wire format it speaks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ai::models::ApiFormat;

/// Unique identifier for each supported provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    #[default]
    Anthropic,
    Google,
    #[serde(rename = "openai")]
    OpenAI,
    Ollama,
}

impl ProviderId {
    /// Get all available provider IDs
    pub fn all() -> &'static [ProviderId] {
        &[
            ProviderId::Anthropic,
            ProviderId::Google,
            ProviderId::OpenAI,
            ProviderId::Ollama,
        ]
    }

    /// Key used in config files and on the command line
    pub fn storage_key(&self) -> &'static str {
        match self {
            ProviderId::Anthropic => "anthropic",
            ProviderId::Google => "google",
            ProviderId::OpenAI => "openai",
            ProviderId::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderId::Anthropic => write!(f, "Anthropic"),
            ProviderId::Google => write!(f, "Google"),
            ProviderId::OpenAI => write!(f, "OpenAI"),
            ProviderId::Ollama => write!(f, "Ollama"),
        }
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::all()
            .iter()
            .copied()
            .find(|p| p.storage_key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown provider '{}'", s))
    }
}

/// How to send the API key in requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthHeader {
    /// Use `x-api-key: <key>` header (Anthropic style)
    #[default]
    XApiKey,
    /// Use `Authorization: Bearer <key>` header (OpenAI style)
    Bearer,
    /// Key travels in the query string (Google style)
    QueryKey,
    /// No credentials (local servers)
    None,
}

/// Configuration for an AI provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: ProviderId,
    /// API base URL (without trailing slash)
    pub base_url: String,
    pub auth_header: AuthHeader,
    pub api_format: ApiFormat,
    /// Environment variable holding the API key, if one is needed
    pub api_key_env: Option<String>,
    pub default_model: String,
}

impl ProviderConfig {
    /// Built-in configuration for a provider
    pub fn builtin(id: ProviderId) -> Self {
        match id {
            ProviderId::Anthropic => Self {
                id,
                base_url: "https://api.anthropic.com/v1".to_string(),
                auth_header: AuthHeader::XApiKey,
                api_format: ApiFormat::Anthropic,
                api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
                default_model: "claude-sonnet-4-5".to_string(),
            },
            ProviderId::Google => Self {
                id,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                auth_header: AuthHeader::QueryKey,
                api_format: ApiFormat::Google,
                api_key_env: Some("GEMINI_API_KEY".to_string()),
                default_model: "gemini-2.5-flash".to_string(),
            },
            ProviderId::OpenAI => Self {
                id,
                base_url: "https://api.openai.com/v1".to_string(),
                auth_header: AuthHeader::Bearer,
                api_format: ApiFormat::OpenAI,
                api_key_env: Some("OPENAI_API_KEY".to_string()),
                default_model: "gpt-4.1".to_string(),
            },
            ProviderId::Ollama => Self {
                id,
                base_url: "http://localhost:11434".to_string(),
                auth_header: AuthHeader::None,
                api_format: ApiFormat::Ollama,
                api_key_env: None,
                default_model: "gpt-oss:20b".to_string(),
            },
        }
    }

    /// Whether requests need an API key at all
    pub fn requires_api_key(&self) -> bool {
        self.auth_header != AuthHeader::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!("anthropic".parse::<ProviderId>(), Ok(ProviderId::Anthropic));
        assert_eq!(" Google ".parse::<ProviderId>(), Ok(ProviderId::Google));
        assert_eq!("OPENAI".parse::<ProviderId>(), Ok(ProviderId::OpenAI));
        assert!("bedrock".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_builtin_formats_match_providers() {
        for id in ProviderId::all() {
            let config = ProviderConfig::builtin(*id);
            assert_eq!(config.id, *id);
            assert!(!config.base_url.ends_with('/'));
        }
        assert_eq!(
            ProviderConfig::builtin(ProviderId::Google).api_format,
            ApiFormat::Google
        );
    }

    #[test]
    fn test_local_provider_needs_no_key() {
        assert!(!ProviderConfig::builtin(ProviderId::Ollama).requires_api_key());
        assert!(ProviderConfig::builtin(ProviderId::Anthropic).requires_api_key());
    }
}
