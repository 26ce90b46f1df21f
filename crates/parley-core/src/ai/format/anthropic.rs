//! Anthropic API format handler
//!
//! Handles message alternation and tool conversion for the Anthropic Messages
//! API. Tool results travel as `tool_result` parts inside a user message.

use serde_json::Value;
use tracing::debug;

use super::{arguments_as_object, push_merged, FormatHandler, RequestOptions};
use crate::ai::parsers::AnthropicParser;
use crate::ai::sse::FrameParser;
use crate::ai::types::{AiTool, Message, Role};

/// Anthropic format handler
#[derive(Default)]
pub struct AnthropicFormat;

impl AnthropicFormat {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for AnthropicFormat {
    /// Convert domain messages to Anthropic format
    ///
    /// The API requires user/assistant messages to strictly alternate, so
    /// consecutive same-role messages (several tool results, or a tool result
    /// followed by user text) are merged into one message.
    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        let mut result: Vec<Value> = Vec::new();
        debug!("Converting {} messages for Anthropic API", messages.len());

        for msg in messages {
            let (role, parts) = match msg.role {
                Role::System => continue,
                Role::User => ("user", text_part(&msg.content)),
                Role::Tool => (
                    "user",
                    vec![serde_json::json!({
                        "type": "tool_result",
                        "tool_use_id": msg.tool_call_id.as_deref().unwrap_or_default(),
                        "content": msg.content,
                    })],
                ),
                Role::Assistant => {
                    let mut parts = text_part(&msg.content);
                    parts.extend(msg.calls().iter().map(|call| {
                        serde_json::json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": arguments_as_object(&call.arguments),
                        })
                    }));
                    ("assistant", parts)
                }
            };
            push_merged(&mut result, role, "content", parts);
        }

        result
    }

    fn convert_tools(&self, tools: &[AiTool]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                })
            })
            .collect()
    }

    fn build_request_body(
        &self,
        model: &str,
        messages: Vec<Value>,
        options: &RequestOptions,
    ) -> Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": options.max_tokens,
        });

        if options.streaming {
            body["stream"] = serde_json::json!(true);
        }

        if let Some(system) = options.system_prompt {
            body["system"] = serde_json::json!(system);
        }

        if !options.tools.is_empty() {
            body["tools"] = serde_json::json!(self.convert_tools(options.tools));
        }

        body
    }

    fn endpoint_path(&self, _model: &str) -> String {
        "/messages".to_string()
    }

    fn parser(&self) -> Box<dyn FrameParser> {
        Box::new(AnthropicParser::new())
    }
}

/// Anthropic rejects empty text blocks
fn text_part(text: &str) -> Vec<Value> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![serde_json::json!({"type": "text", "text": text})]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::stream::CompletionRequest;
    use crate::ai::types::ToolCall;
    use serde_json::json;

    fn tool_round() -> Vec<Message> {
        vec![
            Message::system("be brief"),
            Message::user("read both"),
            Message::assistant("Reading.").with_tool_calls(vec![
                ToolCall::new("t1", "read", r#"{"file_path":"/a"}"#),
                ToolCall::new("t2", "read", r#"{"file_path":"/b"}"#),
            ]),
            Message::tool_result("t1", "A"),
            Message::tool_result("t2", "B"),
        ]
    }

    #[test]
    fn test_tool_results_merge_into_one_user_message() {
        let converted = AnthropicFormat::new().convert_messages(&tool_round());
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[1]["role"], "assistant");
        assert_eq!(converted[1]["content"][1]["type"], "tool_use");
        assert_eq!(converted[1]["content"][1]["input"], json!({"file_path": "/a"}));
        assert_eq!(converted[2]["role"], "user");
        let results = converted[2]["content"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["tool_use_id"], "t1");
        assert_eq!(results[1]["content"], "B");
    }

    #[test]
    fn test_streaming_body_extracts_system() {
        let handler = AnthropicFormat::new();
        let body = handler.build_streaming_body(&CompletionRequest {
            model: "claude-sonnet-4-5".to_string(),
            messages: tool_round(),
            tools: vec![AiTool {
                name: "read".to_string(),
                description: "Read a file".to_string(),
                input_schema: json!({"type": "object"}),
            }],
            max_tokens: 1024,
        });
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["tools"][0]["input_schema"], json!({"type": "object"}));
        assert!(body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .all(|m| m["role"] != "system"));
    }

    #[test]
    fn test_empty_assistant_text_is_omitted() {
        let converted = AnthropicFormat::new().convert_messages(&[
            Message::user("hi"),
            Message::assistant("").with_tool_calls(vec![ToolCall::new("t", "now", "{}")]),
        ]);
        let parts = converted[1]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0]["type"], "tool_use");
    }
}
