//! AI provider layer
//!
//! Talks to Anthropic, Google, OpenAI and Ollama and normalizes their
//! streaming output into one neutral event stream.

pub mod client;
pub mod format;
pub mod models;
pub mod parsers;
pub mod providers;
pub mod sse;
pub mod stream;
pub mod types;

pub use client::{AiClient, AiClientConfig};
pub use stream::{CompletionProvider, CompletionRequest, EventStream};
