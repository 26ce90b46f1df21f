//! Core AI Client
//!
//! The main AiClient struct that handles API communication with multiple providers.

use reqwest::Client;
use tracing::{debug, error};

use super::config::AiClientConfig;
use crate::ai::models::ApiFormat;
use crate::ai::providers::{AuthHeader, ProviderId};
use crate::constants;

/// AI API client supporting multiple providers
#[derive(Clone)]
pub struct AiClient {
    http: Client,
    config: AiClientConfig,
    api_key: Option<String>,
}

impl AiClient {
    /// Create the HTTP client with configuration suited to long streams
    fn create_http_client() -> Client {
        Client::builder()
            .user_agent(constants::http::USER_AGENT)
            .connect_timeout(constants::http::CONNECT_TIMEOUT)
            .timeout(constants::http::STREAM_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build HTTP client: {}. Using default client.", e);
                Client::new()
            })
    }

    pub fn new(config: AiClientConfig, api_key: Option<String>) -> Self {
        Self {
            http: Self::create_http_client(),
            config,
            api_key,
        }
    }

    pub fn provider_id(&self) -> ProviderId {
        self.config.provider_id()
    }

    pub fn config(&self) -> &AiClientConfig {
        &self.config
    }

    /// Build a request with proper authentication headers
    pub(crate) fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.post(url);

        if let Some(key) = self.api_key.as_deref() {
            match self.config.provider.auth_header {
                AuthHeader::Bearer => {
                    request = request.header("authorization", format!("Bearer {}", key));
                }
                AuthHeader::XApiKey => {
                    request = request.header("x-api-key", key);
                }
                AuthHeader::QueryKey => {
                    request = request.query(&[("key", key)]);
                }
                AuthHeader::None => {}
            }
        } else if self.config.provider.requires_api_key() {
            debug!(
                "No API key configured for {}, sending unauthenticated request",
                self.config.provider_id()
            );
        }

        if self.config.provider.api_format == ApiFormat::Anthropic {
            request = request.header("anthropic-version", constants::http::ANTHROPIC_VERSION);
        }

        request.header("content-type", "application/json")
    }
}

/// Turn a non-2xx response body into a readable message
///
/// Vendors wrap errors differently; pull out `error.message` (or a string
/// `error`) when the body is JSON, otherwise keep the raw text.
pub(crate) fn describe_error_body(status: reqwest::StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .or_else(|| json.get("error").filter(|e| e.is_string()))
                .or_else(|| json.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    if detail.is_empty() {
        format!("API error: {}", status)
    } else {
        format!("API error: {} - {}", status, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_describe_error_body_json() {
        let msg = describe_error_body(
            StatusCode::UNAUTHORIZED,
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        );
        assert_eq!(msg, "API error: 401 Unauthorized - invalid x-api-key");
    }

    #[test]
    fn test_describe_error_body_plain_and_empty() {
        assert_eq!(
            describe_error_body(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "API error: 502 Bad Gateway - upstream down"
        );
        assert_eq!(
            describe_error_body(StatusCode::NOT_FOUND, ""),
            "API error: 404 Not Found"
        );
        assert_eq!(
            describe_error_body(StatusCode::NOT_FOUND, r#"{"error":"model 'x' not found"}"#),
            "API error: 404 Not Found - model 'x' not found"
        );
    }
}
