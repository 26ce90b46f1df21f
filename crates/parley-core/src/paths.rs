//! Filesystem locations
//!
//! Everything lives under `~/.parley` unless `PARLEY_HOME` points elsewhere.

use std::path::PathBuf;

use crate::constants::fs::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, SYSTEM_PROMPT_FILE_NAME};

/// Environment variable overriding the config directory
pub const HOME_ENV: &str = "PARLEY_HOME";

/// Root config directory
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

pub fn config_file() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Persisted sessions, one JSON file each
pub fn sessions_dir() -> PathBuf {
    config_dir().join("sessions")
}

/// Optional system prompt override
pub fn system_prompt_file() -> PathBuf {
    config_dir().join(SYSTEM_PROMPT_FILE_NAME)
}
