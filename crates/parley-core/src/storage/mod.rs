//! Session persistence
//!
//! The engine only depends on the `SessionStore` trait. Two stores ship:
//! an in-memory one and a directory of JSON files.

mod sessions;

pub use sessions::{JsonFileStore, MemorySessionStore};

use crate::ai::types::Message;

/// Load and save a session's message list by id
///
/// Loading an unknown id yields an empty list.
pub trait SessionStore: Send + Sync {
    fn load(&self, session_id: &str) -> anyhow::Result<Vec<Message>>;
    fn save(&self, session_id: &str, messages: &[Message]) -> anyhow::Result<()>;
}
