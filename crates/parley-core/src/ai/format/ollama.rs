//! Ollama chat API format handler

use serde_json::Value;

use super::{arguments_as_object, FormatHandler, RequestOptions};
use crate::ai::parsers::OllamaParser;
use crate::ai::sse::{FrameParser, Framing};
use crate::ai::types::{AiTool, Message, Role};

#[derive(Default)]
pub struct OllamaFormat;

impl OllamaFormat {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for OllamaFormat {
    /// Ollama takes object arguments and answers tool calls by function name
    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|msg| {
                let role = match msg.role {
                    Role::User | Role::System => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                };
                let mut obj = serde_json::json!({
                    "role": role,
                    "content": msg.content,
                });
                if !msg.calls().is_empty() {
                    obj["tool_calls"] = msg
                        .calls()
                        .iter()
                        .map(|call| {
                            serde_json::json!({
                                "function": {
                                    "name": call.name,
                                    "arguments": arguments_as_object(&call.arguments)
                                }
                            })
                        })
                        .collect();
                }
                if let Some(name) = msg
                    .tool_call_id
                    .as_deref()
                    .and_then(|id| tool_name(messages, id))
                {
                    obj["tool_name"] = serde_json::json!(name);
                }
                obj
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
        mut messages: Vec<Value>,
        options: &RequestOptions,
    ) -> Value {
        if let Some(system) = options.system_prompt {
            messages.insert(0, serde_json::json!({"role": "system", "content": system}));
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": options.streaming,
            "options": {"num_predict": options.max_tokens},
        });

        if !options.tools.is_empty() {
            body["tools"] = serde_json::json!(self.convert_tools(options.tools));
        }

        body
    }

    fn endpoint_path(&self, _model: &str) -> String {
        "/api/chat".to_string()
    }

    fn framing(&self) -> Framing {
        Framing::JsonLines
    }

    fn parser(&self) -> Box<dyn FrameParser> {
        Box::new(OllamaParser::new())
    }
}

fn tool_name<'a>(messages: &'a [Message], call_id: &str) -> Option<&'a str> {
    messages
        .iter()
        .flat_map(|m| m.calls())
        .find(|c| c.id == call_id)
        .map(|c| c.name.as_str())
}
