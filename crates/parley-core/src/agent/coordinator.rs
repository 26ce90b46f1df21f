//! Tool invocation coordinator
//!
//! Tracks every tool call announced during one turn:
//!
//! ```text
//! announced -> (auto-approved | permission_pending) -> executing -> resolved | denied | errored
//! ```
//!
//! Settlement is evaluated against the coordinator's own per-round sets after
//! every individual result, never re-derived from session state, and fires
//! exactly once per round.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::ai::types::{Message, ToolCall};
use crate::constants;
use crate::tools::PermissionPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Announced,
    PermissionPending,
    Executing,
    Resolved,
    Denied,
    Errored,
}

impl ToolCallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ToolCallStatus::Resolved | ToolCallStatus::Denied | ToolCallStatus::Errored
        )
    }
}

/// What the engine must do with a freshly announced call
#[derive(Debug, Clone, PartialEq)]
pub enum Announcement {
    /// An equivalent call already exists this turn or in history; drop it silently
    Duplicate,
    Execute(ToolCall),
    AwaitPermission(ToolCall),
    /// The call settled on the spot (disabled tool)
    Settled(Settlement),
}

/// A call reaching a terminal state
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub tool_call: ToolCall,
    pub status: ToolCallStatus,
    /// Tool-role message carrying the result
    pub message: Message,
    /// Set when this settlement completed the round
    pub round: Option<RoundSettled>,
}

/// Everything the continuation needs once a round settles
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSettled {
    pub round: u64,
    /// Calls in announcement order
    pub tool_calls: Vec<ToolCall>,
    /// Result messages in the same order as `tool_calls`
    pub results: Vec<Message>,
}

#[derive(Debug, Default)]
pub struct ToolCoordinator {
    round: u64,
    calls: Vec<ToolCall>,
    status: HashMap<String, ToolCallStatus>,
    results: HashMap<String, Message>,
    stream_finished: bool,
    settled: bool,
    abandoned: bool,
}

impl ToolCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new turn, discarding all tracking from the previous one
    pub fn begin_turn(&mut self) -> u64 {
        self.round += 1;
        self.calls.clear();
        self.status.clear();
        self.results.clear();
        self.stream_finished = false;
        self.settled = false;
        self.abandoned = false;
        debug!("Tool round {} started", self.round);
        self.round
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn calls(&self) -> &[ToolCall] {
        &self.calls
    }

    pub fn status(&self, id: &str) -> Option<ToolCallStatus> {
        self.status.get(id).copied()
    }

    /// Calls still waiting for an allow/deny decision
    pub fn pending_permissions(&self) -> Vec<&ToolCall> {
        self.calls
            .iter()
            .filter(|c| self.status(&c.id) == Some(ToolCallStatus::PermissionPending))
            .collect()
    }

    /// Whether any call of this round has not reached a terminal state
    pub fn has_outstanding(&self) -> bool {
        self.status.values().any(|s| !s.is_terminal())
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// Register a call from the stream and decide how it proceeds
    ///
    /// `history` is the session as it stands; calls already present there
    /// with equivalent arguments count as duplicates too.
    pub fn announce(
        &mut self,
        call: ToolCall,
        history: &[Message],
        policy: &dyn PermissionPolicy,
    ) -> Announcement {
        if self.status.contains_key(&call.id) || self.is_duplicate(&call, history) {
            info!(
                "Dropping duplicate tool call {} ({}) {}",
                call.id, call.name, call.arguments
            );
            return Announcement::Duplicate;
        }

        self.calls.push(call.clone());
        self.status.insert(call.id.clone(), ToolCallStatus::Announced);

        if !policy.is_enabled(&call.name) {
            let reason = format!("Tool '{}' is disabled", call.name);
            let settlement = self.record(&call.id, ToolCallStatus::Errored, error_content(&reason));
            return Announcement::Settled(settlement);
        }

        if policy.requires_permission(&call.name) {
            self.status
                .insert(call.id.clone(), ToolCallStatus::PermissionPending);
            Announcement::AwaitPermission(call)
        } else {
            self.status.insert(call.id.clone(), ToolCallStatus::Executing);
            Announcement::Execute(call)
        }
    }

    fn is_duplicate(&self, call: &ToolCall, history: &[Message]) -> bool {
        let canonical = canonical_arguments(&call.arguments);
        let equivalent = |other: &ToolCall| {
            other.name == call.name && canonical_arguments(&other.arguments) == canonical
        };

        self.calls.iter().any(equivalent) || history.iter().flat_map(|m| m.calls()).any(equivalent)
    }

    /// Permission granted: the call moves to executing
    pub fn allow(&mut self, id: &str) -> Option<ToolCall> {
        if self.status(id) != Some(ToolCallStatus::PermissionPending) {
            warn!("Ignoring allow for {} (not awaiting permission)", id);
            return None;
        }
        self.status.insert(id.to_string(), ToolCallStatus::Executing);
        self.calls.iter().find(|c| c.id == id).cloned()
    }

    /// Permission refused: settles at once with the denial marker, no execution
    pub fn deny(&mut self, id: &str) -> Option<Settlement> {
        if self.status(id) != Some(ToolCallStatus::PermissionPending) {
            warn!("Ignoring deny for {} (not awaiting permission)", id);
            return None;
        }
        Some(self.record(
            id,
            ToolCallStatus::Denied,
            constants::tools::DENIED_MARKER.to_string(),
        ))
    }

    /// An execution finished; `Err` carries the failure text
    pub fn settle(&mut self, id: &str, outcome: Result<String, String>) -> Option<Settlement> {
        if self.status(id) != Some(ToolCallStatus::Executing) {
            warn!("Ignoring result for {} (not executing)", id);
            return None;
        }
        Some(match outcome {
            Ok(output) => self.record(id, ToolCallStatus::Resolved, output),
            Err(error) => self.record(id, ToolCallStatus::Errored, error_content(&error)),
        })
    }

    /// The turn's stream reached `done`; may settle a round whose calls all finished early
    pub fn mark_stream_finished(&mut self) -> Option<RoundSettled> {
        self.stream_finished = true;
        self.check_settled()
    }

    /// The turn's stream was cancelled or failed: results still land, no continuation
    pub fn abandon(&mut self) {
        if !self.abandoned {
            info!("Tool round {} abandoned", self.round);
        }
        self.abandoned = true;
    }

    fn record(&mut self, id: &str, status: ToolCallStatus, content: String) -> Settlement {
        self.status.insert(id.to_string(), status);
        let message = Message::tool_result(id, content);
        self.results.insert(id.to_string(), message.clone());
        let tool_call = self
            .calls
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .unwrap_or_else(|| ToolCall::new(id, "", ""));
        debug!("Tool call {} settled as {:?}", id, status);

        Settlement {
            tool_call,
            status,
            message,
            round: self.check_settled(),
        }
    }

    fn check_settled(&mut self) -> Option<RoundSettled> {
        if self.settled || self.abandoned || !self.stream_finished || self.calls.is_empty() {
            return None;
        }
        if self.has_outstanding() {
            return None;
        }

        self.settled = true;
        let results = self
            .calls
            .iter()
            .filter_map(|c| self.results.get(&c.id).cloned())
            .collect();
        info!(
            "Tool round {} settled with {} call(s)",
            self.round,
            self.calls.len()
        );
        Some(RoundSettled {
            round: self.round,
            tool_calls: self.calls.clone(),
            results,
        })
    }
}

/// Structured error result content
fn error_content(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

/// Normalize an argument payload for duplicate detection
///
/// Parses the text (unwrapping a doubly-encoded JSON string), sorts object
/// keys recursively and re-serializes. Empty text, `null` and `{}` are the
/// same payload. Text that is not JSON is compared trimmed.
pub fn canonical_arguments(arguments: &str) -> String {
    let trimmed = arguments.trim();
    if trimmed.is_empty() {
        return "{}".to_string();
    }

    let mut value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(_) => return trimmed.to_string(),
    };
    if let Value::String(inner) = &value {
        if let Ok(parsed) = serde_json::from_str::<Value>(inner.trim()) {
            value = parsed;
        }
    }
    if value.is_null() {
        return "{}".to_string();
    }
    sorted(value).to_string()
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sorted(v))).collect();
            Value::Object(ordered.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}
