//! Read tool - Read text files

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;
use tracing::info;

use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

/// Maximum file size to read (5 MB)
const MAX_READ_SIZE: u64 = 5 * 1024 * 1024;

/// Lines returned when no limit is given
const DEFAULT_LINE_LIMIT: usize = 2000;

pub struct ReadFileTool;

#[derive(Deserialize)]
struct Params {
    file_path: String,
    /// 1-based first line
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file. Relative paths resolve against the working directory. Returns up to 2000 lines unless offset/limit select a window. Max 5MB."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to read"
                },
                "offset": {
                    "type": "integer",
                    "description": "1-based line to start from"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return"
                }
            },
            "required": ["file_path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let path = ctx.resolve_path(&params.file_path);
        info!("Read tool: resolved path = {:?}", path);

        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) => return ToolResult::error(format!("Cannot read {}: {}", path.display(), e)),
        };
        if metadata.is_dir() {
            return ToolResult::error(format!("{} is a directory", path.display()));
        }
        if metadata.len() > MAX_READ_SIZE {
            return ToolResult::error(format!(
                "File too large: {} bytes (max {} MB)",
                metadata.len(),
                MAX_READ_SIZE / (1024 * 1024)
            ));
        }

        let text = match fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) => return ToolResult::error(format!("Cannot read {}: {}", path.display(), e)),
        };

        let skip = params.offset.unwrap_or(1).saturating_sub(1);
        let limit = params.limit.unwrap_or(DEFAULT_LINE_LIMIT);
        let window: Vec<&str> = text.lines().skip(skip).take(limit).collect();
        ToolResult::success(window.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_relative_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n").unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = ReadFileTool
            .execute(json!({"file_path": "a.txt"}), &ctx)
            .await;
        assert!(!result.is_error);
        assert_eq!(result.output, "one\ntwo\nthree");
    }

    #[tokio::test]
    async fn test_read_window() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "1\n2\n3\n4\n5").unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = ReadFileTool
            .execute(json!({"file_path": "a.txt", "offset": 2, "limit": 2}), &ctx)
            .await;
        assert_eq!(result.output, "2\n3");
    }

    #[tokio::test]
    async fn test_missing_file_and_directory_are_errors() {
        let dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(dir.path());

        let missing = ReadFileTool
            .execute(json!({"file_path": "nope.txt"}), &ctx)
            .await;
        assert!(missing.is_error);

        let directory = ReadFileTool
            .execute(json!({"file_path": "."}), &ctx)
            .await;
        assert!(directory.is_error);
        assert!(directory.output.contains("directory"));
    }
}
