//! OpenAI API format handler
//!
//! Handles conversion to the OpenAI chat/completions format.

use serde_json::Value;

use super::{FormatHandler, RequestOptions};
use crate::ai::parsers::OpenAIParser;
use crate::ai::sse::FrameParser;
use crate::ai::types::{AiTool, Message, Role};

/// OpenAI format handler
#[derive(Default)]
pub struct OpenAIFormat;

impl OpenAIFormat {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for OpenAIFormat {
    /// Convert domain messages to OpenAI chat/completions format
    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .filter_map(|msg| match msg.role {
                Role::System => None,
                Role::Tool => Some(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": msg.tool_call_id,
                    "content": msg.content
                })),
                Role::Assistant if !msg.calls().is_empty() => {
                    let tool_calls: Vec<Value> = msg
                        .calls()
                        .iter()
                        .map(|call| {
                            serde_json::json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments
                                }
                            })
                        })
                        .collect();
                    let mut msg_obj = serde_json::json!({
                        "role": "assistant",
                        "tool_calls": tool_calls
                    });
                    if !msg.content.is_empty() {
                        msg_obj["content"] = serde_json::json!(msg.content);
                    }
                    Some(msg_obj)
                }
                Role::Assistant => Some(serde_json::json!({
                    "role": "assistant",
                    "content": msg.content
                })),
                Role::User => Some(serde_json::json!({
                    "role": "user",
                    "content": msg.content
                })),
            })
            .collect()
    }

    fn convert_tools(&self, tools: &[AiTool]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.input_schema
                    }
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
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }

        // Add system message at the start if present
        if let Some(system) = options.system_prompt {
            if let Some(msgs) = body.get_mut("messages").and_then(|m| m.as_array_mut()) {
                msgs.insert(
                    0,
                    serde_json::json!({
                        "role": "system",
                        "content": system
                    }),
                );
            }
        }

        if !options.tools.is_empty() {
            body["tools"] = serde_json::json!(self.convert_tools(options.tools));
        }

        body
    }

    fn endpoint_path(&self, _model: &str) -> String {
        "/chat/completions".to_string()
    }

    fn parser(&self) -> Box<dyn FrameParser> {
        Box::new(OpenAIParser::new())
    }
}
