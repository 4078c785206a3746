//! Agent workflow
//!
//! - `AgentConfig` - per-request limits and the system prompt
//! - `AgentState` - working message history of one request
//! - `trim_history` - bounds what the model sees
//! - `WorkflowEngine` - the Agent/Tools state machine

pub mod config;
pub mod state;
pub mod trimmer;
pub mod workflow;

pub use config::{AgentConfig, DEFAULT_SYSTEM_PROMPT};
pub use state::AgentState;
pub use trimmer::{trim_history, TrimBudget, TrimPolicy};
pub use workflow::{
    notification_channel, AgentNotification, NotificationReceiver, NotificationSender,
    WorkflowEngine,
};
