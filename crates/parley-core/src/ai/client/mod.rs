//! AI Client module
//!
//! Provider-agnostic streaming client. Every request is routed through the
//! format handler for the provider's API format:
//! - Anthropic Messages
//! - Google Gemini
//! - OpenAI chat/completions
//! - Ollama chat

pub mod config;
pub mod core;
pub mod streaming;

pub use config::AiClientConfig;
pub use core::AiClient;
