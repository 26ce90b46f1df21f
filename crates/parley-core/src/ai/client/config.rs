//! AI Client configuration

use crate::ai::providers::{ProviderConfig, ProviderId};

/// Configuration for the AI client
#[derive(Debug, Clone)]
pub struct AiClientConfig {
    pub provider: ProviderConfig,
    /// Optional base URL override (defaults to the provider's)
    pub base_url: Option<String>,
}

impl AiClientConfig {
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            base_url: None,
        }
    }

    /// Builder: override the base URL (local proxies, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn provider_id(&self) -> ProviderId {
        self.provider.id
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(&self.provider.base_url)
            .trim_end_matches('/')
    }

    /// Full URL for an endpoint path produced by a format handler
    pub fn api_url(&self, endpoint_path: &str) -> String {
        format!("{}{}", self.base_url(), endpoint_path)
    }
}

impl From<ProviderId> for AiClientConfig {
    fn from(id: ProviderId) -> Self {
        Self::new(ProviderConfig::builtin(id))
    }
}
