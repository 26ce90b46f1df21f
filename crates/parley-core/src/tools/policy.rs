//! Config-backed permission policy

use std::collections::HashSet;

use super::host::PermissionPolicy;
use crate::config::ToolsConfig;

/// Permission rules read from the `[tools]` config table
#[derive(Debug, Clone, Default)]
pub struct ToolPolicy {
    disabled: HashSet<String>,
    auto_approve: HashSet<String>,
    approve_all: bool,
}

impl ToolPolicy {
    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            disabled: config.disabled.iter().cloned().collect(),
            auto_approve: config.auto_approve.iter().cloned().collect(),
            approve_all: false,
        }
    }

    /// Builder: skip every permission prompt (disabled tools stay disabled)
    pub fn approve_all(mut self) -> Self {
        self.approve_all = true;
        self
    }
}

impl PermissionPolicy for ToolPolicy {
    fn requires_permission(&self, name: &str) -> bool {
        !self.approve_all && !self.auto_approve.contains(name)
    }

    fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.contains(name)
    }
}
