//! OpenAI chat-completions SSE parser
//!
//! Tool-call argument fragments arrive keyed by `index`; the id and name only
//! appear on the first fragment. Calls are reassembled per index and flushed,
//! in index order, when the choice reports a finish reason. Some compatible
//! servers omit `index`; their fragments are keyed by call id instead.

use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use super::{token_count, usage_if_reported};
use crate::ai::sse::{
    parse_finish_reason, synthesize_call_id, FrameParser, ParsedEvent, ToolCallAccumulator,
};

#[derive(Default)]
pub struct OpenAIParser {
    pending: BTreeMap<u64, ToolCallAccumulator>,
}

impl OpenAIParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer slot for a fragment without `index`: the call with the same id,
    /// a new slot for an unseen id, else the most recent call
    fn slot_without_index(&self, delta: &Value) -> u64 {
        let next = self.pending.keys().next_back().map_or(0, |last| last + 1);
        match delta.get("id").and_then(|i| i.as_str()) {
            Some(id) => self
                .pending
                .iter()
                .find(|(_, acc)| acc.id == id)
                .map_or(next, |(slot, _)| *slot),
            None => next.saturating_sub(1),
        }
    }

    fn accumulate_tool_call(&mut self, delta: &Value) {
        let index = match delta.get("index").and_then(|i| i.as_u64()) {
            Some(index) => index,
            None => self.slot_without_index(delta),
        };
        let function = delta.get("function");
        let name = function
            .and_then(|f| f.get("name"))
            .and_then(|n| n.as_str());
        let fragment = function
            .and_then(|f| f.get("arguments"))
            .and_then(|a| a.as_str())
            .unwrap_or("");

        let acc = self.pending.entry(index).or_insert_with(|| {
            let id = delta
                .get("id")
                .and_then(|i| i.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| synthesize_call_id("call"));
            debug!("tool call start: index={}, id={}", index, id);
            ToolCallAccumulator::new(id, String::new())
        });
        if let Some(name) = name {
            if acc.name.is_empty() {
                acc.name = name.to_string();
            }
        }
        acc.add_arguments(fragment);
    }

    fn flush(&mut self) -> Vec<ParsedEvent> {
        std::mem::take(&mut self.pending)
            .into_values()
            .map(|acc| ParsedEvent::ToolCallComplete(acc.complete()))
            .collect()
    }
}

impl FrameParser for OpenAIParser {
    fn parse_event(&mut self, json: &Value) -> Result<Vec<ParsedEvent>> {
        if let Some(error) = json.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown provider error");
            return Ok(vec![ParsedEvent::Error(message.to_string())]);
        }

        let mut events = Vec::new();

        if let Some(choice) = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
        {
            if let Some(delta) = choice.get("delta") {
                if let Some(reasoning) = delta.get("reasoning_content").and_then(|r| r.as_str()) {
                    events.push(ParsedEvent::ReasoningDelta(reasoning.to_string()));
                }
                if let Some(content) = delta.get("content").and_then(|c| c.as_str()) {
                    events.push(ParsedEvent::TextDelta(content.to_string()));
                }
                if let Some(tool_calls) = delta.get("tool_calls").and_then(|t| t.as_array()) {
                    for tool_call in tool_calls {
                        self.accumulate_tool_call(tool_call);
                    }
                }
            }

            if let Some(reason) = choice.get("finish_reason").and_then(|r| r.as_str()) {
                debug!("finish_reason: {:?}", parse_finish_reason(reason));
                events.extend(self.flush());
            }
        }

        // With include_usage the final chunk has empty choices and a usage object
        if let Some(usage) = json.get("usage").filter(|u| !u.is_null()) {
            let prompt = token_count(usage, "prompt_tokens");
            let completion = token_count(usage, "completion_tokens");
            if let Some(usage) = usage_if_reported(prompt, completion) {
                events.push(ParsedEvent::Usage(usage));
            }
        }

        if events.is_empty() {
            events.push(ParsedEvent::Skip);
        }
        Ok(events)
    }

    fn finish(&mut self) -> Vec<ParsedEvent> {
        self.flush()
    }
}
