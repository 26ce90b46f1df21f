//! Google Gemini SSE parser for streaming responses

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use super::{token_count, usage_if_reported};
use crate::ai::sse::{synthesize_call_id, FinishReason, FrameParser, ParsedEvent};
use crate::ai::types::ToolCall;

/// Google Gemini SSE parser
///
/// Parses the Google AI streaming response format:
/// ```json
/// {"candidates": [{"content": {"parts": [{"text": "..."}], "role": "model"}, "finishReason": "STOP"}]}
/// ```
///
/// Every chunk is a complete candidate; function-call parts carry no id, so
/// one is synthesized per emitted call.
#[derive(Default)]
pub struct GoogleParser;

impl GoogleParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse Google finish reason to our FinishReason enum
    fn parse_finish_reason(reason: &str) -> FinishReason {
        match reason {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "OTHER" => FinishReason::Stop,
            _ => FinishReason::Other(reason.to_string()),
        }
    }

    fn parse_part(part: &Value) -> Option<ParsedEvent> {
        if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
            let is_thought = part.get("thought").and_then(|t| t.as_bool()) == Some(true);
            return Some(if is_thought {
                ParsedEvent::ReasoningDelta(text.to_string())
            } else {
                ParsedEvent::TextDelta(text.to_string())
            });
        }

        let function_call = part.get("functionCall")?;
        let name = function_call.get("name").and_then(|n| n.as_str())?;
        if name.is_empty() {
            return None;
        }
        let arguments = match function_call.get("args") {
            Some(args) if !args.is_null() => args.to_string(),
            _ => "{}".to_string(),
        };
        let id = synthesize_call_id("google");
        debug!("functionCall part: name={}, synthesized id={}", name, id);
        Some(ParsedEvent::ToolCallComplete(ToolCall::new(
            id, name, arguments,
        )))
    }
}

impl FrameParser for GoogleParser {
    fn parse_event(&mut self, json: &Value) -> Result<Vec<ParsedEvent>> {
        if let Some(message) = json.pointer("/error/message").and_then(|m| m.as_str()) {
            return Ok(vec![ParsedEvent::Error(message.to_string())]);
        }

        let mut events = Vec::new();
        let mut finish = None;

        if let Some(candidate) = json
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
        {
            if let Some(parts) = candidate.pointer("/content/parts").and_then(|p| p.as_array()) {
                events.extend(parts.iter().filter_map(Self::parse_part));
            }
            finish = candidate
                .get("finishReason")
                .and_then(|f| f.as_str())
                .map(Self::parse_finish_reason);
        }

        // Usage metadata rides along on (at least) the final chunk
        if let Some(usage) = json.get("usageMetadata") {
            let prompt = token_count(usage, "promptTokenCount");
            let completion = token_count(usage, "candidatesTokenCount");
            if let Some(usage) = usage_if_reported(prompt, completion) {
                events.push(ParsedEvent::Usage(usage));
            }
        }

        if let Some(reason) = finish {
            events.push(ParsedEvent::Finish { reason });
        }

        if events.is_empty() {
            events.push(ParsedEvent::Skip);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::Usage;
    use serde_json::json;

    #[test]
    fn test_all_parts_in_chunk_are_emitted() {
        let mut parser = GoogleParser::new();
        let events = parser
            .parse_event(&json!({
                "candidates": [{"content": {"role": "model", "parts": [
                    {"text": "Let me look."},
                    {"functionCall": {"name": "read", "args": {"file_path": "/a.ts"}}},
                    {"functionCall": {"name": "read", "args": {"file_path": "/b.ts"}}}
                ]}}]
            }))
            .unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ParsedEvent::TextDelta("Let me look.".to_string()));
        let calls: Vec<_> = events[1..]
            .iter()
            .map(|e| match e {
                ParsedEvent::ToolCallComplete(call) => call.clone(),
                other => panic!("expected tool call, got {:?}", other),
            })
            .collect();
        assert_eq!(calls[0].arguments, r#"{"file_path":"/a.ts"}"#);
        assert!(calls[0].id.starts_with("google_"));
        assert_ne!(calls[0].id, calls[1].id);
    }

    #[test]
    fn test_final_chunk_with_usage_then_finish() {
        let mut parser = GoogleParser::new();
        let events = parser
            .parse_event(&json!({
                "candidates": [{"content": {"parts": [{"text": "done"}]}, "finishReason": "STOP"}],
                "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4}
            }))
            .unwrap();
        assert_eq!(
            events,
            vec![
                ParsedEvent::TextDelta("done".to_string()),
                ParsedEvent::Usage(Usage::new(10, 4)),
                ParsedEvent::Finish {
                    reason: FinishReason::Stop
                },
            ]
        );
    }

    #[test]
    fn test_thought_parts_are_reasoning() {
        let mut parser = GoogleParser::new();
        let events = parser
            .parse_event(&json!({
                "candidates": [{"content": {"parts": [{"text": "pondering", "thought": true}]}}]
            }))
            .unwrap();
        assert_eq!(events, vec![ParsedEvent::ReasoningDelta("pondering".to_string())]);
    }

    #[test]
    fn test_function_call_without_args() {
        let mut parser = GoogleParser::new();
        let events = parser
            .parse_event(&json!({
                "candidates": [{"content": {"parts": [{"functionCall": {"name": "now"}}]}}]
            }))
            .unwrap();
        match &events[0] {
            ParsedEvent::ToolCallComplete(call) => assert_eq!(call.arguments, "{}"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_frame() {
        let mut parser = GoogleParser::new();
        let events = parser
            .parse_event(&json!({"error": {"code": 429, "message": "quota exceeded"}}))
            .unwrap();
        assert_eq!(events, vec![ParsedEvent::Error("quota exceeded".to_string())]);
    }
}
