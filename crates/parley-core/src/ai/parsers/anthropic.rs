//! Anthropic SSE parser
//!
//! Tool calls arrive in three phases (`content_block_start` with the call id,
//! `input_json_delta` fragments keyed by block index, `content_block_stop`).
//! Partial calls are buffered per call id and emitted once on stop.

use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::{token_count, usage_if_reported};
use crate::ai::sse::{
    parse_finish_reason, FinishReason, FrameParser, ParsedEvent, ToolCallAccumulator,
};

#[derive(Default)]
pub struct AnthropicParser {
    /// Content block index -> call id
    block_ids: HashMap<u64, String>,
    /// Call id -> partial call
    pending: HashMap<String, ToolCallAccumulator>,
    prompt_tokens: usize,
}

impl AnthropicParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn block_index(json: &Value) -> u64 {
        json.get("index").and_then(|i| i.as_u64()).unwrap_or(0)
    }

    fn content_block_start(&mut self, json: &Value) -> Vec<ParsedEvent> {
        let Some(block) = json.get("content_block") else {
            return vec![ParsedEvent::Skip];
        };
        match block.get("type").and_then(|t| t.as_str()) {
            Some("tool_use") => {
                let id = block
                    .get("id")
                    .and_then(|i| i.as_str())
                    .unwrap_or_default()
                    .to_string();
                let name = block
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or_default()
                    .to_string();
                debug!("tool_use block start: id={}, name={}", id, name);
                self.block_ids.insert(Self::block_index(json), id.clone());
                self.pending
                    .insert(id.clone(), ToolCallAccumulator::new(id, name));
                vec![ParsedEvent::Skip]
            }
            Some("text") => {
                let text = block.get("text").and_then(|t| t.as_str()).unwrap_or("");
                vec![ParsedEvent::TextDelta(text.to_string())]
            }
            _ => vec![ParsedEvent::Skip],
        }
    }

    fn content_block_delta(&mut self, json: &Value) -> Result<Vec<ParsedEvent>> {
        let delta = json
            .get("delta")
            .ok_or_else(|| anyhow::anyhow!("content_block_delta without delta"))?;
        let text_field = |key: &str| {
            delta
                .get(key)
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string()
        };

        let event = match delta.get("type").and_then(|t| t.as_str()) {
            Some("text_delta") => ParsedEvent::TextDelta(text_field("text")),
            Some("thinking_delta") => ParsedEvent::ReasoningDelta(text_field("thinking")),
            Some("input_json_delta") => {
                let index = Self::block_index(json);
                let acc = self
                    .block_ids
                    .get(&index)
                    .and_then(|id| self.pending.get_mut(id));
                match acc {
                    Some(acc) => acc.add_arguments(&text_field("partial_json")),
                    None => anyhow::bail!("input_json_delta for unknown block {}", index),
                }
                ParsedEvent::Skip
            }
            _ => ParsedEvent::Skip,
        };
        Ok(vec![event])
    }

    fn content_block_stop(&mut self, json: &Value) -> Vec<ParsedEvent> {
        let index = Self::block_index(json);
        match self
            .block_ids
            .remove(&index)
            .and_then(|id| self.pending.remove(&id))
        {
            Some(acc) => vec![ParsedEvent::ToolCallComplete(acc.complete())],
            None => vec![ParsedEvent::Skip],
        }
    }
}

impl FrameParser for AnthropicParser {
    fn parse_event(&mut self, json: &Value) -> Result<Vec<ParsedEvent>> {
        let event_type = json
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow::anyhow!("frame without type"))?;

        match event_type {
            "message_start" => {
                if let Some(usage) = json.pointer("/message/usage") {
                    self.prompt_tokens = token_count(usage, "input_tokens");
                }
                Ok(vec![ParsedEvent::Skip])
            }
            "content_block_start" => Ok(self.content_block_start(json)),
            "content_block_delta" => self.content_block_delta(json),
            "content_block_stop" => Ok(self.content_block_stop(json)),
            "message_delta" => {
                let mut events = Vec::new();
                if let Some(usage) = json.get("usage") {
                    let completion = token_count(usage, "output_tokens");
                    if let Some(usage) = usage_if_reported(self.prompt_tokens, completion) {
                        events.push(ParsedEvent::Usage(usage));
                    }
                }
                if let Some(reason) = json.pointer("/delta/stop_reason").and_then(|r| r.as_str())
                {
                    debug!("stop_reason: {:?}", parse_finish_reason(reason));
                }
                Ok(events)
            }
            "message_stop" => Ok(vec![ParsedEvent::Finish {
                reason: FinishReason::Stop,
            }]),
            "error" => {
                let message = json
                    .pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown provider error");
                Ok(vec![ParsedEvent::Error(message.to_string())])
            }
            "ping" => Ok(vec![ParsedEvent::Skip]),
            other => {
                debug!("Ignoring Anthropic event type {}", other);
                Ok(vec![ParsedEvent::Skip])
            }
        }
    }
}
