//! Parley Core - streaming chat orchestration
//!
//! This crate provides everything behind the `parley` binary:
//! - Provider adapters normalizing vendor streams into one event union
//! - Tool call coordination with permission gating and deduplication
//! - Continuation of tool rounds and context budget enforcement
//! - Hooks that rewrite prompts and streamed output
//! - Configuration, prompts and session persistence

pub mod agent;
pub mod ai;
pub mod config;
pub mod constants;
pub mod paths;
pub mod prompts;
pub mod storage;
pub mod tools;

// Re-exports for convenience
pub use agent::{
    ChatEngine, EngineConfig, EngineEvent, EngineHandle, EngineServices, HookRegistry,
};
pub use ai::types::{AiTool, Message, Role, StreamEvent, ToolCall};
pub use ai::{AiClient, AiClientConfig, CompletionProvider};
pub use config::{Config, ConfigError};
pub use storage::{JsonFileStore, MemorySessionStore, SessionStore};
pub use tools::{ToolPolicy, ToolRegistry};
