//! Agent Configuration
//!
//! Configuration options for the workflow engine and stream sessions.

use std::time::Duration;

use super::trimmer::{TrimBudget, TrimPolicy};

/// Default system prompt when none is configured
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Use the available tools \
when they help you answer accurately. Keep answers concise.";

/// Configuration for the agent workflow
///
/// Use the builder pattern to configure the agent:
///
/// ```ignore
/// let config = AgentConfig::new("You are a helpful assistant")
///     .with_max_rounds(10)
///     .with_trim_policy(TrimPolicy::new(TrimBudget::Messages(10)))
///     .with_request_timeout(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// System prompt, prepended to every model call; never trimmed and not
    /// counted against the trim budget
    pub system_prompt: Option<String>,

    /// Maximum number of model invocations per request (prevents runaway loops)
    pub max_rounds: usize,

    /// History trimming applied before each model call
    pub trim_policy: TrimPolicy,

    /// Wall-clock budget for one request
    pub request_timeout: Option<Duration>,

    /// Idle period after which a comment frame is written so proxies keep
    /// the stream open
    pub keep_alive: Option<Duration>,

    /// Capacity of the engine → session notification queue
    pub notification_buffer: usize,
}

impl AgentConfig {
    /// Create a new agent configuration with a system prompt
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            ..Self::default()
        }
    }

    /// Remove the system prompt
    pub fn without_system_prompt(mut self) -> Self {
        self.system_prompt = None;
        self
    }

    /// Set maximum model rounds per request
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    /// Set the history trimming policy
    pub fn with_trim_policy(mut self, policy: TrimPolicy) -> Self {
        self.trim_policy = policy;
        self
    }

    /// Set the per-request wall-clock timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Disable the per-request timeout
    pub fn without_request_timeout(mut self) -> Self {
        self.request_timeout = None;
        self
    }

    pub fn with_keep_alive(mut self, period: Duration) -> Self {
        self.keep_alive = Some(period);
        self
    }

    pub fn without_keep_alive(mut self) -> Self {
        self.keep_alive = None;
        self
    }

    /// Set the notification queue capacity
    pub fn with_notification_buffer(mut self, capacity: usize) -> Self {
        self.notification_buffer = capacity.max(1);
        self
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_rounds: 10,
            trim_policy: TrimPolicy::new(TrimBudget::Messages(10)),
            request_timeout: Some(Duration::from_secs(120)),
            keep_alive: Some(Duration::from_secs(15)),
            notification_buffer: 64,
        }
    }
}
