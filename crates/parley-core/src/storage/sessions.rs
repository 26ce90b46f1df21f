//! Session store implementations

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::SessionStore;
use crate::ai::types::Message;

/// Process-local store; contents are lost on exit
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .sessions
            .lock()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save(&self, session_id: &str, messages: &[Message]) -> Result<()> {
        self.sessions
            .lock()
            .insert(session_id.to_string(), messages.to_vec());
        Ok(())
    }
}

/// One `<session_id>.json` file per session under a directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            bail!("Invalid session id: {:?}", session_id);
        }
        Ok(self.dir.join(format!("{}.json", session_id)))
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self, session_id: &str) -> Result<Vec<Message>> {
        let path = self.path_for(session_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        let messages: Vec<Message> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse session file {}", path.display()))?;
        debug!("Loaded {} message(s) for session {}", messages.len(), session_id);
        Ok(messages)
    }

    fn save(&self, session_id: &str, messages: &[Message]) -> Result<()> {
        let path = self.path_for(session_id)?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        // Write-then-rename so a crash never leaves a truncated file
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(messages)?;
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        debug!("Saved {} message(s) for session {}", messages.len(), session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::ToolCall;
    use tempfile::TempDir;

    fn conversation() -> Vec<Message> {
        vec![
            Message::user("read it"),
            Message::assistant("").with_tool_calls(vec![ToolCall::new("c1", "read_file", "{}")]),
            Message::tool_result("c1", "contents"),
        ]
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert!(store.load("s").unwrap().is_empty());

        let messages = conversation();
        store.save("s", &messages).unwrap();
        assert_eq!(store.load("s").unwrap(), messages);
        assert!(store.load("other").unwrap().is_empty());

        store.save("s", &messages[..1]).unwrap();
        assert_eq!(store.load("s").unwrap().len(), 1);
    }

    #[test]
    fn test_json_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let messages = conversation();

        JsonFileStore::new(dir.path()).save("abc-123", &messages).unwrap();
        let loaded = JsonFileStore::new(dir.path()).load("abc-123").unwrap();
        assert_eq!(loaded, messages);
        assert_eq!(loaded[2].tool_call_id.as_deref(), Some("c1"));
        assert!(!dir.path().join("abc-123.json.tmp").exists());
    }

    #[test]
    fn test_json_store_missing_and_invalid_ids() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));
        assert!(store.load("nothing-here").unwrap().is_empty());
        assert!(store.save("../escape", &[]).is_err());
        assert!(store.load("").is_err());
    }

    #[test]
    fn test_json_store_reports_corrupt_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let err = JsonFileStore::new(dir.path()).load("bad").unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
