//! Ollama chat parser (newline-delimited JSON)
//!
//! Each line carries a partial `message`; tool calls arrive whole with object
//! arguments and no id. The final line has `done: true` plus eval counts.

use anyhow::Result;
use serde_json::Value;

use super::{token_count, usage_if_reported};
use crate::ai::sse::{parse_finish_reason, synthesize_call_id, FrameParser, ParsedEvent};
use crate::ai::types::ToolCall;

#[derive(Default)]
pub struct OllamaParser;

impl OllamaParser {
    pub fn new() -> Self {
        Self
    }

    fn tool_call(value: &Value) -> Option<ToolCall> {
        let function = value.get("function")?;
        let name = function.get("name").and_then(|n| n.as_str())?;
        let arguments = match function.get("arguments") {
            Some(Value::String(raw)) => raw.clone(),
            Some(args) if !args.is_null() => args.to_string(),
            _ => "{}".to_string(),
        };
        let id = value
            .get("id")
            .and_then(|i| i.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| synthesize_call_id("ollama"));
        Some(ToolCall::new(id, name, arguments))
    }
}

impl FrameParser for OllamaParser {
    fn parse_event(&mut self, json: &Value) -> Result<Vec<ParsedEvent>> {
        if let Some(error) = json.get("error").and_then(|e| e.as_str()) {
            return Ok(vec![ParsedEvent::Error(error.to_string())]);
        }

        let mut events = Vec::new();
        if let Some(message) = json.get("message") {
            if let Some(thinking) = message.get("thinking").and_then(|t| t.as_str()) {
                events.push(ParsedEvent::ReasoningDelta(thinking.to_string()));
            }
            if let Some(content) = message.get("content").and_then(|c| c.as_str()) {
                events.push(ParsedEvent::TextDelta(content.to_string()));
            }
            if let Some(calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
                events.extend(
                    calls
                        .iter()
                        .filter_map(Self::tool_call)
                        .map(ParsedEvent::ToolCallComplete),
                );
            }
        }

        if json.get("done").and_then(|d| d.as_bool()) == Some(true) {
            let prompt = token_count(json, "prompt_eval_count");
            let completion = token_count(json, "eval_count");
            if let Some(usage) = usage_if_reported(prompt, completion) {
                events.push(ParsedEvent::Usage(usage));
            }
            let reason = json
                .get("done_reason")
                .and_then(|r| r.as_str())
                .unwrap_or("stop");
            events.push(ParsedEvent::Finish {
                reason: parse_finish_reason(reason),
            });
        }

        if events.is_empty() {
            anyhow::bail!("line carries neither message nor done flag");
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::sse::FinishReason;
    use crate::ai::types::Usage;
    use serde_json::json;

    #[test]
    fn test_content_line() {
        let mut parser = OllamaParser::new();
        let events = parser
            .parse_event(&json!({"model": "llama3", "message": {"role": "assistant", "content": "Hi"}, "done": false}))
            .unwrap();
        assert_eq!(events, vec![ParsedEvent::TextDelta("Hi".to_string())]);
    }

    #[test]
    fn test_tool_calls_get_ids_and_string_args() {
        let mut parser = OllamaParser::new();
        let events = parser
            .parse_event(&json!({"message": {"role": "assistant", "content": "", "tool_calls": [
                {"function": {"name": "read", "arguments": {"file_path": "/a.ts"}}}
            ]}, "done": false}))
            .unwrap();
        match &events[1] {
            ParsedEvent::ToolCallComplete(call) => {
                assert_eq!(call.name, "read");
                assert_eq!(call.arguments, r#"{"file_path":"/a.ts"}"#);
                assert!(call.id.starts_with("ollama_"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_done_line_reports_usage() {
        let mut parser = OllamaParser::new();
        let events = parser
            .parse_event(&json!({"message": {"role": "assistant", "content": ""}, "done": true,
                "done_reason": "stop", "prompt_eval_count": 26, "eval_count": 290}))
            .unwrap();
        assert_eq!(
            events,
            vec![
                ParsedEvent::TextDelta(String::new()),
                ParsedEvent::Usage(Usage::new(26, 290)),
                ParsedEvent::Finish {
                    reason: FinishReason::Stop
                },
            ]
        );
    }

    #[test]
    fn test_error_and_unknown_lines() {
        let mut parser = OllamaParser::new();
        assert_eq!(
            parser.parse_event(&json!({"error": "model not found"})).unwrap(),
            vec![ParsedEvent::Error("model not found".to_string())]
        );
        assert!(parser.parse_event(&json!({"status": "pulling"})).is_err());
    }
}
