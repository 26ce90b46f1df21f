//! Engine commands and events
//!
//! Consumers drive the engine with `EngineCommand`s and observe it through
//! `EngineEvent`s; both travel over unbounded channels.

use serde::{Deserialize, Serialize};

use super::budget::ContextUsage;
use super::coordinator::ToolCallStatus;
use crate::ai::types::{Message, StreamEvent, ToolCall};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Start a turn with a user message
    Submit { content: String },
    Allow { tool_call_id: String },
    Deny { tool_call_id: String },
    /// Stop the active stream (or abandon the open round); running tools are left alone
    Cancel,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A neutral event from the provider, forwarded in order
    Stream { event: StreamEvent },
    ToolStatus {
        tool_call_id: String,
        name: String,
        status: ToolCallStatus,
    },
    /// The call waits for `Allow` or `Deny`; there is no timeout
    PermissionRequested { tool_call: ToolCall },
    ToolResult { message: Message },
    ContextUsage { usage: ContextUsage },
    /// The budget vetoed the send; submit again after freeing context
    Halted { usage: ContextUsage },
    TurnComplete,
    /// `Submit` arrived while a turn was still running
    Busy,
}
