//! Context budget manager
//!
//! Estimates the token cost of an outbound message list and applies the
//! configured policy before anything is sent. Only the outbound copy is
//! filtered; session history is never touched here.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ai::types::{Message, Role};
use crate::constants::budget::{
    CHARS_PER_TOKEN, EVICTION_PERCENT, HALT_THRESHOLD_PERCENT, MAX_ITERATIONS,
    ROLLING_THRESHOLD_PERCENT, TOOL_CALL_OVERHEAD,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationPolicy {
    /// Evict the oldest turns until the estimate fits
    #[default]
    Rolling,
    /// Refuse to send once the budget is exhausted
    Halt,
}

/// Context-usage readout exposed to consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContextUsage {
    pub used: usize,
    pub total: usize,
}

impl ContextUsage {
    /// Whole-number share of the budget in use
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            return 100;
        }
        self.used * 100 / self.total
    }

    fn at_least(&self, percent: usize) -> bool {
        self.used * 100 >= self.total * percent
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetOutcome {
    /// What may be sent; empty when halted
    pub messages: Vec<Message>,
    /// The send was vetoed; surface as a recoverable stop
    pub halted: bool,
    /// Number of messages evicted by rolling truncation
    pub evicted: usize,
    /// Rolling truncation passes that evicted something
    pub passes: usize,
    pub usage: ContextUsage,
}

/// Cheap per-message token estimate (not vendor-accurate)
pub fn estimate_message_tokens(message: &Message) -> usize {
    let reasoning = message.reasoning.as_deref().map_or(0, str::len);
    let calls: usize = message
        .calls()
        .iter()
        .map(|c| TOOL_CALL_OVERHEAD + c.arguments.len() / CHARS_PER_TOKEN)
        .sum();
    message.content.len() / CHARS_PER_TOKEN + reasoning / CHARS_PER_TOKEN + calls
}

pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    pub policy: TruncationPolicy,
    pub total: usize,
}

impl ContextBudget {
    pub fn new(policy: TruncationPolicy, total: usize) -> Self {
        Self { policy, total }
    }

    /// Filter a prospective message list against the budget
    ///
    /// `system_override` replaces every system message in the list.
    pub fn apply(&self, messages: &[Message], system_override: Option<&str>) -> BudgetOutcome {
        let messages = match system_override {
            Some(system) => {
                let mut replaced = vec![Message::system(system)];
                replaced.extend(messages.iter().filter(|m| m.role != Role::System).cloned());
                replaced
            }
            None => messages.to_vec(),
        };

        let usage = self.usage_of(&messages);
        match self.policy {
            TruncationPolicy::Halt => {
                if usage.at_least(HALT_THRESHOLD_PERCENT) {
                    info!(
                        "Context budget exhausted ({} / {} tokens), halting",
                        usage.used, usage.total
                    );
                    BudgetOutcome {
                        messages: Vec::new(),
                        halted: true,
                        evicted: 0,
                        passes: 0,
                        usage,
                    }
                } else {
                    BudgetOutcome {
                        messages,
                        halted: false,
                        evicted: 0,
                        passes: 0,
                        usage,
                    }
                }
            }
            TruncationPolicy::Rolling => self.roll(messages),
        }
    }

    fn usage_of(&self, messages: &[Message]) -> ContextUsage {
        ContextUsage {
            used: estimate_tokens(messages),
            total: self.total,
        }
    }

    fn roll(&self, messages: Vec<Message>) -> BudgetOutcome {
        let (system, mut rest): (Vec<Message>, Vec<Message>) =
            messages.into_iter().partition(|m| m.role == Role::System);
        let mut evicted = 0;
        let mut passes = 0;

        let mut usage = self.usage_with(&system, &rest);
        while passes < MAX_ITERATIONS {
            if !usage.at_least(ROLLING_THRESHOLD_PERCENT) {
                break;
            }
            let Some(boundary) = eviction_boundary(&rest) else {
                debug!("Only the last user turn remains, stopping truncation");
                break;
            };
            rest.drain(..boundary);
            evicted += boundary;
            passes += 1;
            usage = self.usage_with(&system, &rest);
            debug!(
                "Rolling truncation pass {}: evicted {}, now {} / {} tokens",
                passes,
                boundary,
                usage.used,
                usage.total
            );
        }

        if evicted > 0 {
            info!(
                "Rolling truncation evicted {} message(s) in {} pass(es), {} / {} tokens",
                evicted, passes, usage.used, usage.total
            );
        }

        let mut kept = system;
        kept.extend(rest);
        BudgetOutcome {
            messages: kept,
            halted: false,
            evicted,
            passes,
            usage,
        }
    }

    fn usage_with(&self, system: &[Message], rest: &[Message]) -> ContextUsage {
        ContextUsage {
            used: estimate_tokens(system) + estimate_tokens(rest),
            total: self.total,
        }
    }
}

/// How many leading non-system messages to evict next
///
/// Takes ceil(30%) (at least one), then snaps forward to the next user
/// message so a user/assistant/tool-result group is never split. Never cuts
/// past the last user message; `None` when nothing can go.
fn eviction_boundary(messages: &[Message]) -> Option<usize> {
    let last_user = messages
        .iter()
        .rposition(|m| m.role == Role::User)
        .unwrap_or(messages.len().saturating_sub(1));
    if last_user == 0 {
        return None;
    }

    let count = (messages.len() * EVICTION_PERCENT).div_ceil(100).max(1);
    let snapped = (count..messages.len())
        .find(|&i| messages[i].role == Role::User)
        .unwrap_or(messages.len());
    Some(snapped.min(last_user))
}
