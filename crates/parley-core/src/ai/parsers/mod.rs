//! Frame parser implementations for the supported providers

mod anthropic;
mod google;
mod ollama;
mod openai;

pub use anthropic::AnthropicParser;
pub use google::GoogleParser;
pub use ollama::OllamaParser;
pub use openai::OpenAIParser;

use serde_json::Value;

use crate::ai::types::Usage;

/// Read a token count field, treating absent or malformed values as zero
pub(crate) fn token_count(value: &Value, key: &str) -> usize {
    value.get(key).and_then(|t| t.as_u64()).unwrap_or(0) as usize
}

/// Build a usage event only when the vendor reported something
pub(crate) fn usage_if_reported(prompt: usize, completion: usize) -> Option<Usage> {
    (prompt > 0 || completion > 0).then(|| Usage::new(prompt, completion))
}
