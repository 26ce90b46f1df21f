//! Tool registry for managing available tools

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::host::ToolHost;
use crate::ai::types::AiTool;
use crate::constants;

/// Tool execution result
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Create a success result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// Create an error result
    pub fn error(msg: impl std::fmt::Display) -> Self {
        Self {
            output: msg.to_string(),
            is_error: true,
        }
    }

    pub fn into_result(self) -> Result<String, String> {
        if self.is_error {
            Err(self.output)
        } else {
            Ok(self.output)
        }
    }
}

/// Parse tool parameters, returning a ToolResult error on failure
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolResult> {
    serde_json::from_value(params)
        .map_err(|e| ToolResult::error(format!("Invalid parameters: {}", e)))
}

/// Context for tool execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub working_dir: PathBuf,
    /// Optional per-call timeout override
    pub timeout: Option<Duration>,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
        }
    }
}

impl ToolContext {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            timeout: None,
        }
    }

    /// Resolve a path relative to working directory (absolute paths pass through)
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = PathBuf::from(path);
        if p.is_absolute() {
            p
        } else {
            self.working_dir.join(p)
        }
    }
}

/// Trait for tool implementations
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (id)
    fn name(&self) -> &str;

    /// Tool description for AI
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool
    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult;
}

/// Registry for managing tools
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
    /// Default timeout for tool execution
    default_timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
            default_timeout: constants::tools::DEFAULT_TIMEOUT,
        }
    }

    /// Builder: change the default execution timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register a tool
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().await;
        tools.insert(name, tool);
    }

    /// Get a tool by name
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// Get all tools as AI tool definitions, sorted by name
    pub async fn get_ai_tools(&self) -> Vec<AiTool> {
        let tools = self.tools.read().await;
        let mut defs: Vec<AiTool> = tools
            .values()
            .map(|t| AiTool {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.parameters_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name with timeout
    pub async fn execute(
        &self,
        name: &str,
        params: Value,
        ctx: &ToolContext,
    ) -> Option<ToolResult> {
        let tool = self.get(name).await?;
        tracing::info!(tool = name, "ToolRegistry: executing");
        let timeout = ctx.timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();

        let result = match tokio::time::timeout(timeout, tool.execute(params, ctx)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    tool = name,
                    timeout_secs = timeout.as_secs(),
                    "Tool execution timed out"
                );
                ToolResult::error(format!(
                    "Tool '{}' timed out after {} seconds",
                    name,
                    timeout.as_secs()
                ))
            }
        };

        tracing::info!(
            tool = name,
            is_error = result.is_error,
            duration_ms = start.elapsed().as_millis() as u64,
            "ToolRegistry: finished"
        );
        Some(result)
    }
}

#[async_trait]
impl ToolHost for ToolRegistry {
    async fn execute(&self, name: &str, args: Value, working_dir: &Path) -> anyhow::Result<String> {
        let ctx = ToolContext::new(working_dir);
        match ToolRegistry::execute(self, name, args, &ctx).await {
            Some(result) => result.into_result().map_err(anyhow::Error::msg),
            None => anyhow::bail!("Unknown tool: {}", name),
        }
    }

    async fn definitions(&self) -> Vec<AiTool> {
        self.get_ai_tools().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct SleepyTool;

    #[async_trait]
    impl Tool for SleepyTool {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn description(&self) -> &str {
            "Sleeps"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ToolResult::success("woke")
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the text parameter"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
            #[derive(serde::Deserialize)]
            struct Params {
                text: String,
            }
            match parse_params::<Params>(params) {
                Ok(p) => ToolResult::success(p.text),
                Err(e) => e,
            }
        }
    }

    #[tokio::test]
    async fn test_tool_registry_nonexistent_tool() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute("nonexistent_tool", json!({}), &ToolContext::new("/tmp"))
            .await;
        assert!(result.is_none());

        let host: &dyn ToolHost = &registry;
        let err = host
            .execute("nonexistent_tool", json!({}), Path::new("/tmp"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_tool_host_maps_results() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await;
        let host: &dyn ToolHost = &registry;

        let ok = host
            .execute("echo", json!({"text": "hi"}), Path::new("/tmp"))
            .await
            .unwrap();
        assert_eq!(ok, "hi");

        let err = host
            .execute("echo", json!({"wrong": 1}), Path::new("/tmp"))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid parameters"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_result() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SleepyTool)).await;
        let mut ctx = ToolContext::new("/tmp");
        ctx.timeout = Some(Duration::from_millis(20));

        let result = registry.execute("sleepy", json!({}), &ctx).await.unwrap();
        assert!(result.is_error);
        assert!(result.output.contains("timed out"));
    }

    #[tokio::test]
    async fn test_definitions_sorted() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SleepyTool)).await;
        registry.register(Arc::new(EchoTool)).await;
        let names: Vec<String> = registry
            .get_ai_tools()
            .await
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["echo", "sleepy"]);
    }

    #[test]
    fn test_resolve_path() {
        let ctx = ToolContext::new("/work");
        assert_eq!(ctx.resolve_path("a/b.txt"), PathBuf::from("/work/a/b.txt"));
        assert_eq!(ctx.resolve_path("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
