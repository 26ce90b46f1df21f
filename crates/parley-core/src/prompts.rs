//! System prompt selection

use std::path::Path;
use tracing::{debug, warn};

/// Used when no `SYSTEM.md` override exists
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Parley, a helpful assistant with access to tools. \
Use a tool when it gets you facts you do not have; otherwise answer directly. \
Keep answers short and say so when you are unsure.";

/// Read the system prompt from `path`, falling back to the default when the
/// file is missing, unreadable or blank
pub fn load_system_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            debug!("Using system prompt from {}", path.display());
            content.trim().to_string()
        }
        Ok(_) => DEFAULT_SYSTEM_PROMPT.to_string(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => DEFAULT_SYSTEM_PROMPT.to_string(),
        Err(e) => {
            warn!("Failed to read {}: {}, using default prompt", path.display(), e);
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}
