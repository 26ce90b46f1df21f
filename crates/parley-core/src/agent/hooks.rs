//! Message hooks
//!
//! Two ordered pipelines the engine runs on every turn:
//! - `PreMessageHook`s rewrite the user's text and the history sent with it
//!   before the message enters the session.
//! - `StreamHook`s rewrite each streamed content or reasoning chunk before it
//!   is appended to the in-flight message and shown to the consumer.
//!
//! A hook error aborts its pipeline; the engine reports it as a turn error.

use anyhow::Result;
use chrono::Local;
use std::sync::Arc;

use crate::ai::types::Message;
use crate::config::HooksConfig;

/// Outgoing user text plus the history it will be sent with
#[derive(Debug, Clone, PartialEq)]
pub struct PreMessage {
    pub content: String,
    pub history: Vec<Message>,
}

/// One streamed chunk as seen by stream hooks
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub content: String,
    /// Chunk belongs to the reasoning stream rather than the answer
    pub is_reasoning: bool,
    /// Answer text received so far in this message, before this chunk
    pub full_text: String,
}

pub trait PreMessageHook: Send + Sync {
    fn name(&self) -> &str;
    fn process(&self, message: PreMessage) -> Result<PreMessage>;
}

pub trait StreamHook: Send + Sync {
    fn name(&self) -> &str;
    fn process(&self, chunk: StreamChunk) -> Result<StreamChunk>;
}

/// Ordered hook pipelines
#[derive(Default, Clone)]
pub struct HookRegistry {
    pre_message: Vec<Arc<dyn PreMessageHook>>,
    stream: Vec<Arc<dyn StreamHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in hooks the config turns on
    pub fn from_config(config: &HooksConfig) -> Self {
        let mut registry = Self::new();
        if config.timestamp {
            registry.add_pre_message(Arc::new(TimestampHook));
        }
        if !config.redact.is_empty() {
            registry.add_stream(Arc::new(RedactHook::new(config.redact.clone())));
        }
        registry
    }

    pub fn add_pre_message(&mut self, hook: Arc<dyn PreMessageHook>) {
        self.pre_message.push(hook);
    }

    pub fn add_stream(&mut self, hook: Arc<dyn StreamHook>) {
        self.stream.push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.pre_message.is_empty() && self.stream.is_empty()
    }

    /// Run every pre-message hook in registration order
    pub fn process_pre_message(&self, message: PreMessage) -> Result<PreMessage> {
        self.pre_message.iter().try_fold(message, |message, hook| {
            hook.process(message)
                .map_err(|e| e.context(format!("hook '{}' failed", hook.name())))
        })
    }

    /// Run every stream hook in registration order
    pub fn process_stream_chunk(&self, chunk: StreamChunk) -> Result<StreamChunk> {
        self.stream.iter().try_fold(chunk, |chunk, hook| {
            hook.process(chunk)
                .map_err(|e| e.context(format!("hook '{}' failed", hook.name())))
        })
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pre: Vec<&str> = self.pre_message.iter().map(|h| h.name()).collect();
        let stream: Vec<&str> = self.stream.iter().map(|h| h.name()).collect();
        f.debug_struct("HookRegistry")
            .field("pre_message", &pre)
            .field("stream", &stream)
            .finish()
    }
}

/// Prefixes the user's text with the local date and time
pub struct TimestampHook;

impl PreMessageHook for TimestampHook {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn process(&self, mut message: PreMessage) -> Result<PreMessage> {
        let stamp = Local::now().format("%A, %Y-%m-%d %H:%M:%S");
        message.content = format!("[{}]\n{}", stamp, message.content);
        Ok(message)
    }
}

/// Replaces configured literal strings in streamed chunks with `[REDACTED]`
///
/// Matching is per chunk; a secret split across two chunks is not caught.
pub struct RedactHook {
    patterns: Vec<String>,
}

impl RedactHook {
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: patterns.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }
}

impl StreamHook for RedactHook {
    fn name(&self) -> &str {
        "redact"
    }

    fn process(&self, mut chunk: StreamChunk) -> Result<StreamChunk> {
        for pattern in &self.patterns {
            if chunk.content.contains(pattern.as_str()) {
                chunk.content = chunk.content.replace(pattern.as_str(), "[REDACTED]");
            }
        }
        Ok(chunk)
    }
}
