//! Google/Gemini API format handler
//!
//! Handles conversion to Google AI API format (contents, parts, functionDeclarations).

use serde_json::Value;
use std::collections::HashMap;

use super::{arguments_as_object, push_merged, FormatHandler, RequestOptions};
use crate::ai::parsers::GoogleParser;
use crate::ai::sse::FrameParser;
use crate::ai::types::{AiTool, Message, Role};

/// Google format handler
#[derive(Default)]
pub struct GoogleFormat;

impl GoogleFormat {
    pub fn new() -> Self {
        Self
    }
}

impl FormatHandler for GoogleFormat {
    /// Convert messages to Google contents format
    ///
    /// `functionResponse` parts are matched by function name, so tool
    /// results look up the name of the call they answer.
    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        let call_names: HashMap<&str, &str> = messages
            .iter()
            .flat_map(|m| m.calls())
            .map(|c| (c.id.as_str(), c.name.as_str()))
            .collect();

        let mut contents = Vec::new();
        for msg in messages {
            let (role, parts) = match msg.role {
                Role::System => continue,
                Role::User => ("user", text_part(&msg.content)),
                Role::Tool => {
                    let call_id = msg.tool_call_id.as_deref().unwrap_or_default();
                    let name = call_names.get(call_id).copied().unwrap_or(call_id);
                    (
                        "user",
                        vec![serde_json::json!({
                            "functionResponse": {
                                "name": name,
                                "response": {"content": msg.content}
                            }
                        })],
                    )
                }
                Role::Assistant => {
                    let mut parts = text_part(&msg.content);
                    parts.extend(msg.calls().iter().map(|call| {
                        serde_json::json!({
                            "functionCall": {
                                "name": call.name,
                                "args": arguments_as_object(&call.arguments)
                            }
                        })
                    }));
                    ("model", parts)
                }
            };
            push_merged(&mut contents, role, "parts", parts);
        }
        contents
    }

    /// Convert tools to Google function declarations format
    fn convert_tools(&self, tools: &[AiTool]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema
                })
            })
            .collect()
    }

    fn build_request_body(
        &self,
        _model: &str,
        messages: Vec<Value>,
        options: &RequestOptions,
    ) -> Value {
        let mut body = serde_json::json!({
            "contents": messages,
            "generationConfig": {
                "maxOutputTokens": options.max_tokens,
            }
        });

        if let Some(system) = options.system_prompt {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": system}]
            });
        }

        if !options.tools.is_empty() {
            body["tools"] = serde_json::json!([{
                "functionDeclarations": self.convert_tools(options.tools)
            }]);
        }

        body
    }

    /// The API key is added as a `key` query parameter by the client
    fn endpoint_path(&self, model: &str) -> String {
        format!("/models/{}:streamGenerateContent?alt=sse", model)
    }

    fn parser(&self) -> Box<dyn FrameParser> {
        Box::new(GoogleParser::new())
    }
}

fn text_part(text: &str) -> Vec<Value> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![serde_json::json!({"text": text})]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::stream::CompletionRequest;
    use crate::ai::types::ToolCall;
    use serde_json::json;

    #[test]
    fn test_roles_and_function_parts() {
        let converted = GoogleFormat::new().convert_messages(&[
            Message::system("sys"),
            Message::user("weather?"),
            Message::assistant("").with_tool_calls(vec![ToolCall::new(
                "google_1",
                "get_weather",
                r#"{"city":"Oslo"}"#,
            )]),
            Message::tool_result("google_1", "rain"),
        ]);

        assert_eq!(converted.len(), 3);
        assert_eq!(converted[1]["role"], "model");
        assert_eq!(
            converted[1]["parts"][0]["functionCall"],
            json!({"name": "get_weather", "args": {"city": "Oslo"}})
        );
        assert_eq!(converted[2]["role"], "user");
        assert_eq!(
            converted[2]["parts"][0]["functionResponse"]["name"],
            "get_weather"
        );
        assert_eq!(
            converted[2]["parts"][0]["functionResponse"]["response"]["content"],
            "rain"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let handler = GoogleFormat::new();
        let body = handler.build_streaming_body(&CompletionRequest {
            model: "gemini-2.5-flash".to_string(),
            messages: vec![Message::system("sys"), Message::user("hi")],
            tools: vec![AiTool {
                name: "t".to_string(),
                description: "d".to_string(),
                input_schema: json!({"type": "object"}),
            }],
            max_tokens: 256,
        });
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "t");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(
            handler.endpoint_path("gemini-2.5-flash"),
            "/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }
}
