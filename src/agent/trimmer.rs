//! History trimming
//!
//! Bounds the message history handed to the model. Keeps the newest turns,
//! always starts on a user message, and preserves a leading system message
//! outside the budget.

use crate::conversation::{Message, Role};

/// Unit the trim budget is measured in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimBudget {
    /// Ceiling on the number of messages
    Messages(usize),
    /// Ceiling on estimated tokens (about four characters per token)
    Tokens(usize),
}

impl TrimBudget {
    fn limit(&self) -> usize {
        match self {
            TrimBudget::Messages(n) | TrimBudget::Tokens(n) => *n,
        }
    }

    /// Cost of a single message in this budget's unit
    pub fn cost(&self, message: &Message) -> usize {
        match self {
            TrimBudget::Messages(_) => 1,
            TrimBudget::Tokens(_) => {
                let args: usize = message
                    .tool_calls
                    .iter()
                    .map(|c| c.name.len() + c.arguments.to_string().len())
                    .sum();
                (message.content.len() + args).div_ceil(4).max(1)
            }
        }
    }
}

/// Trimming policy applied before every model call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimPolicy {
    pub budget: TrimBudget,
    /// Keep a leading system message regardless of budget
    pub preserve_system: bool,
}

impl TrimPolicy {
    pub fn new(budget: TrimBudget) -> Self {
        Self {
            budget,
            preserve_system: true,
        }
    }

    pub fn with_preserve_system(mut self, preserve: bool) -> Self {
        self.preserve_system = preserve;
        self
    }
}

impl Default for TrimPolicy {
    fn default() -> Self {
        Self::new(TrimBudget::Messages(10))
    }
}

/// Return the newest suffix of `messages` that fits the policy's budget.
///
/// The result starts on a user message (after the optional preserved system
/// message). If even the newest turn is over budget it is returned whole, so
/// a non-empty input never yields an empty output.
pub fn trim_history(messages: &[Message], policy: &TrimPolicy) -> Vec<Message> {
    if messages.is_empty() {
        return Vec::new();
    }

    let budget = policy.budget;
    let (system, rest) = match messages.first() {
        Some(first) if policy.preserve_system && first.role == Role::System => {
            (Some(first), &messages[1..])
        }
        _ => (None, messages),
    };

    let mut result: Vec<Message> = system.into_iter().cloned().collect();
    if rest.is_empty() {
        return result;
    }

    // A preserved system message rides on top of the budget
    let mut remaining = budget.limit();

    // Walk backwards while the next-oldest message still fits
    let mut start = rest.len();
    while start > 0 {
        let cost = budget.cost(&rest[start - 1]);
        if cost > remaining {
            break;
        }
        remaining -= cost;
        start -= 1;
    }

    let start = match rest[start..].iter().position(|m| m.role == Role::User) {
        Some(offset) => start + offset,
        // Newest turn alone is over budget: keep it whole
        None => rest
            .iter()
            .rposition(|m| m.role == Role::User)
            .unwrap_or(rest.len() - 1),
    };

    if start > 0 {
        tracing::debug!(
            "[Trimmer] Dropped {} of {} messages",
            start,
            messages.len()
        );
    }

    result.extend_from_slice(&rest[start..]);
    result
}
