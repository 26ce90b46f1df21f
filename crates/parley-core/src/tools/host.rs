//! Collaborator traits consumed by the engine

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::ai::types::AiTool;

/// Runs named tools
///
/// `execute` returns the result text on success; any `Err` becomes an
/// error-result message for the model, never an engine failure.
#[async_trait]
pub trait ToolHost: Send + Sync {
    async fn execute(&self, name: &str, args: Value, working_dir: &Path) -> anyhow::Result<String>;

    /// Tool definitions advertised to the model
    async fn definitions(&self) -> Vec<AiTool>;
}

/// Per-tool enablement and permission rules
pub trait PermissionPolicy: Send + Sync {
    fn requires_permission(&self, name: &str) -> bool;
    fn is_enabled(&self, name: &str) -> bool;
}
