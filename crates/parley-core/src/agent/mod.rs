//! Agent loop
//!
//! ## Core Components
//! - `Session` - Ordered message list with a single in-flight message
//! - `ToolCoordinator` - Per-turn tool call tracking, dedup and settlement
//! - `ContinuationEngine` - Re-issues a completion once a tool round settles
//! - `ContextBudget` - Token estimate plus rolling/halt truncation
//! - `HookRegistry` - Pre-message and stream chunk rewriting
//! - `ChatEngine` - Task that ties them to a provider and a tool host

pub mod budget;
pub mod continuation;
pub mod coordinator;
pub mod engine;
pub mod events;
pub mod hooks;
pub mod session;

pub use budget::{BudgetOutcome, ContextBudget, ContextUsage, TruncationPolicy};
pub use continuation::ContinuationEngine;
pub use coordinator::{Announcement, RoundSettled, Settlement, ToolCallStatus, ToolCoordinator};
pub use engine::{ChatEngine, EngineConfig, EngineHandle, EngineServices};
pub use events::{EngineCommand, EngineEvent};
pub use hooks::{HookRegistry, PreMessage, PreMessageHook, StreamChunk, StreamHook};
pub use session::Session;
