//! Model metadata
//!
//! Context window sizes drive the context budget; unknown models fall back to
//! a conservative default.

use serde::{Deserialize, Serialize};

use super::providers::ProviderId;
use crate::constants;

/// Wire format for model requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiFormat {
    /// Anthropic Messages API (/messages)
    #[default]
    Anthropic,
    /// Google AI API (/models/{model}:streamGenerateContent)
    Google,
    /// OpenAI Chat Completions API (/chat/completions)
    #[serde(rename = "openai")]
    OpenAI,
    /// Ollama chat API (/api/chat), newline-delimited JSON
    Ollama,
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub id: String,
    pub provider: ProviderId,
    /// Maximum context window in tokens
    pub context_window: usize,
    /// Maximum output tokens
    pub max_output: usize,
}

impl ModelMetadata {
    pub fn new(id: &str, provider: ProviderId) -> Self {
        Self {
            id: id.to_string(),
            provider,
            context_window: constants::ai::DEFAULT_CONTEXT_WINDOW,
            max_output: constants::ai::MAX_OUTPUT_TOKENS,
        }
    }

    /// Builder: set context window
    pub fn with_context(mut self, context: usize, max_output: usize) -> Self {
        self.context_window = context;
        self.max_output = max_output;
        self
    }

    /// Look up metadata for a model, matching by id prefix
    pub fn lookup(provider: ProviderId, model_id: &str) -> Self {
        let id = model_id.to_lowercase();
        let (context, output) = match provider {
            ProviderId::Anthropic if id.starts_with("claude") => (200_000, 16_384),
            ProviderId::Google if id.starts_with("gemini-2.5") => (1_048_576, 65_536),
            ProviderId::Google if id.starts_with("gemini") => (1_048_576, 8_192),
            ProviderId::OpenAI if id.starts_with("gpt-4.1") => (1_047_576, 32_768),
            ProviderId::OpenAI if id.starts_with("gpt-4o") => (128_000, 16_384),
            ProviderId::Ollama => (32_768, 4_096),
            _ => (
                constants::ai::DEFAULT_CONTEXT_WINDOW,
                constants::ai::MAX_OUTPUT_TOKENS,
            ),
        };
        Self::new(model_id, provider).with_context(context, output)
    }

    /// Format context window for display (e.g., "200K", "1M")
    pub fn context_display(&self) -> String {
        if self.context_window >= 1_000_000 {
            format!("{}M", self.context_window / 1_000_000)
        } else {
            format!("{}K", self.context_window / 1000)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_model() {
        let meta = ModelMetadata::lookup(ProviderId::Anthropic, "claude-sonnet-4-5");
        assert_eq!(meta.context_window, 200_000);
        assert_eq!(meta.context_display(), "200K");
    }

    #[test]
    fn test_lookup_unknown_model_uses_default() {
        let meta = ModelMetadata::lookup(ProviderId::OpenAI, "mystery-1");
        assert_eq!(meta.context_window, constants::ai::DEFAULT_CONTEXT_WINDOW);
    }

    #[test]
    fn test_context_display_millions() {
        let meta = ModelMetadata::lookup(ProviderId::Google, "gemini-2.5-pro");
        assert_eq!(meta.context_display(), "1M");
    }
}
