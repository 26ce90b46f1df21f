//! API Format handling
//!
//! Abstracts the differences between the Anthropic, Google, OpenAI and Ollama
//! wire formats. Each format handler knows how to convert messages and tools,
//! build request bodies, and which frame parser decodes its responses.

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

use serde_json::Value;

use crate::ai::models::ApiFormat;
use crate::ai::sse::{FrameParser, Framing};
use crate::ai::stream::CompletionRequest;
use crate::ai::types::{AiTool, Message, Role};

/// Trait for handling different API formats
///
/// Implementations convert between our unified domain types and
/// provider-specific request shapes.
pub trait FormatHandler: Send + Sync {
    /// Convert domain messages to API-specific format (system messages excluded)
    fn convert_messages(&self, messages: &[Message]) -> Vec<Value>;

    /// Convert tools to API-specific format
    fn convert_tools(&self, tools: &[AiTool]) -> Vec<Value>;

    /// Build the complete request body
    fn build_request_body(
        &self,
        model: &str,
        messages: Vec<Value>,
        options: &RequestOptions,
    ) -> Value;

    /// API endpoint path, appended to the provider base URL
    fn endpoint_path(&self, model: &str) -> String;

    /// How responses are framed on the wire
    fn framing(&self) -> Framing {
        Framing::Sse
    }

    /// Fresh parser for one response stream
    fn parser(&self) -> Box<dyn FrameParser>;

    /// Convert a neutral request into this format's streaming body
    fn build_streaming_body(&self, request: &CompletionRequest) -> Value {
        let system_prompt = extract_system_prompt(&request.messages);
        let options = RequestOptions {
            max_tokens: request.max_tokens,
            system_prompt: system_prompt.as_deref(),
            tools: &request.tools,
            streaming: true,
        };
        let messages = self.convert_messages(&request.messages);
        self.build_request_body(&request.model, messages, &options)
    }
}

/// Options for building API requests
pub struct RequestOptions<'a> {
    pub max_tokens: usize,
    pub system_prompt: Option<&'a str>,
    pub tools: &'a [AiTool],
    pub streaming: bool,
}

/// Join every system message into one prompt, `None` when there are none
pub fn extract_system_prompt(messages: &[Message]) -> Option<String> {
    let parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System && !m.content.is_empty())
        .map(|m| m.content.as_str())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Parse a tool call's argument text into a JSON object for formats that
/// want structured input; anything unparseable becomes `{}`
pub(crate) fn arguments_as_object(arguments: &str) -> Value {
    match serde_json::from_str::<Value>(arguments) {
        Ok(value @ Value::Object(_)) => value,
        _ => serde_json::json!({}),
    }
}

/// Append `part` to the last entry if it has the same role, else start a new entry
///
/// Used by formats that require strict user/assistant alternation.
pub(crate) fn push_merged(result: &mut Vec<Value>, role: &str, parts_key: &str, parts: Vec<Value>) {
    if parts.is_empty() {
        return;
    }
    if let Some(last) = result.last_mut() {
        if last.get("role").and_then(|r| r.as_str()) == Some(role) {
            if let Some(existing) = last.get_mut(parts_key).and_then(|p| p.as_array_mut()) {
                existing.extend(parts);
                return;
            }
        }
    }
    let mut entry = serde_json::Map::new();
    entry.insert("role".to_string(), Value::from(role));
    entry.insert(parts_key.to_string(), Value::Array(parts));
    result.push(Value::Object(entry));
}

/// Select the appropriate format handler based on API format
pub fn get_format_handler(format: ApiFormat) -> Box<dyn FormatHandler> {
    match format {
        ApiFormat::Anthropic => Box::new(anthropic::AnthropicFormat::new()),
        ApiFormat::Google => Box::new(google::GoogleFormat::new()),
        ApiFormat::OpenAI => Box::new(openai::OpenAIFormat::new()),
        ApiFormat::Ollama => Box::new(ollama::OllamaFormat::new()),
    }
}
