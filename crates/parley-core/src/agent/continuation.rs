//! Continuation after a settled tool round
//!
//! Rebuilds the outbound history from the coordinator's own bookkeeping so a
//! new completion can pick up the tool results.

use std::collections::HashSet;
use tracing::{debug, info};

use super::coordinator::RoundSettled;
use crate::ai::types::{Message, Role};

/// Collapses repeated settlement triggers into a single continuation
#[derive(Debug, Default)]
pub struct ContinuationEngine {
    in_progress: bool,
}

impl ContinuationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the continuation slot; false if one is already running
    pub fn try_begin(&mut self) -> bool {
        if self.in_progress {
            debug!("Continuation already in progress, ignoring trigger");
            return false;
        }
        self.in_progress = true;
        true
    }

    pub fn finish(&mut self) {
        self.in_progress = false;
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }
}

/// Outbound message list for the request following a settled round
///
/// Prior history without the finished assistant message and this round's
/// results, then an assistant message carrying the round's tool calls, then
/// the results in call order. A default system message is placed first when
/// the list has none.
pub fn reassemble(
    history: &[Message],
    finished_assistant_id: Option<&str>,
    round: &RoundSettled,
    default_system: &str,
) -> Vec<Message> {
    let result_ids: HashSet<&str> = round
        .results
        .iter()
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();

    let mut assistant = None;
    let mut messages: Vec<Message> = Vec::with_capacity(history.len() + round.results.len() + 2);
    for message in history {
        if Some(message.id.as_str()) == finished_assistant_id {
            assistant = Some(message.clone());
            continue;
        }
        let is_round_result = message.role == Role::Tool
            && message
                .tool_call_id
                .as_deref()
                .is_some_and(|id| result_ids.contains(id));
        if !is_round_result {
            messages.push(message.clone());
        }
    }

    let assistant = assistant
        .unwrap_or_else(|| Message::assistant(""))
        .with_tool_calls(round.tool_calls.clone());
    messages.push(assistant);
    messages.extend(round.results.iter().cloned());

    info!(
        "Continuing round {} with {} tool result(s)",
        round.round,
        round.results.len()
    );
    with_default_system(messages, default_system)
}

/// Insert `prompt` as a leading system message unless one is present
pub fn with_default_system(mut messages: Vec<Message>, prompt: &str) -> Vec<Message> {
    if !messages.iter().any(|m| m.role == Role::System) {
        messages.insert(0, Message::system(prompt));
    }
    messages
}
