//! Application constants and configuration defaults
//!
//! Centralized location for magic numbers and default values

use std::time::Duration;

/// HTTP client configuration
pub mod http {
    use super::*;

    /// Connection timeout for HTTP requests
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Streaming timeout - must be long, tool-heavy turns can stream for minutes
    pub const STREAM_TIMEOUT: Duration = Duration::from_secs(600);

    pub const USER_AGENT: &str = "Parley/0.1";

    /// Anthropic API version header value
    pub const ANTHROPIC_VERSION: &str = "2023-06-01";
}

/// AI/LLM configuration
pub mod ai {
    /// Context window assumed for models we have no metadata for
    pub const DEFAULT_CONTEXT_WINDOW: usize = 128_000;

    /// Default maximum output tokens
    pub const MAX_OUTPUT_TOKENS: usize = 8192;
}

/// Context budget policy
pub mod budget {
    /// Rolling truncation kicks in at this share of the budget (percent)
    pub const ROLLING_THRESHOLD_PERCENT: usize = 95;

    /// Halt policy vetoes sends at this share of the budget (percent)
    pub const HALT_THRESHOLD_PERCENT: usize = 100;

    /// Share of remaining non-system messages evicted per iteration (percent)
    pub const EVICTION_PERCENT: usize = 30;

    /// Upper bound on rolling truncation iterations
    pub const MAX_ITERATIONS: usize = 10;

    /// Estimated token cost of a tool call beyond its argument text
    pub const TOOL_CALL_OVERHEAD: usize = 20;

    /// Characters per estimated token
    pub const CHARS_PER_TOKEN: usize = 4;
}

/// Tool execution
pub mod tools {
    use super::*;

    /// Default tool execution timeout (2 minutes)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Result content for a call the user denied
    pub const DENIED_MARKER: &str = "Permission denied by user";
}

/// Filesystem layout
pub mod fs {
    /// Config directory name (under the home directory)
    pub const CONFIG_DIR_NAME: &str = ".parley";

    pub const CONFIG_FILE_NAME: &str = "config.toml";

    /// Optional system prompt override
    pub const SYSTEM_PROMPT_FILE_NAME: &str = "SYSTEM.md";
}
