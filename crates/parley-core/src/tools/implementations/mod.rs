//! Built-in tool implementations
//!
//! - read_file: Read a text file, optionally a line window

pub mod read;

pub use read::ReadFileTool;

use std::sync::Arc;

use crate::tools::registry::ToolRegistry;

/// Register the built-in tools
pub async fn register_builtin_tools(registry: &ToolRegistry) {
    registry.register(Arc::new(ReadFileTool)).await;
}
