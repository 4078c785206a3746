//! Stream events carried on the wire

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::AgentNotification;

/// Prefix of every data line
pub const SSE_DATA_PREFIX: &str = "data: ";

/// Terminator closing a frame (the data line plus one blank line)
pub const SSE_FRAME_DELIMITER: &str = "\n\n";

/// One event of a chat stream session
///
/// A session opens with exactly one `Connected` and closes with exactly one
/// terminal event (`Done` or `Error`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Connected,
    Token {
        token: String,
    },
    ToolStart {
        tool: String,
        input: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
    },
    ToolEnd {
        tool: String,
        output: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        /// Set when the tool failed and `output` is the failure message;
        /// omitted on the wire when false
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    Done,
    Error {
        error: String,
    },
}

impl StreamEvent {
    pub fn token(token: impl Into<String>) -> Self {
        StreamEvent::Token {
            token: token.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: message.into(),
        }
    }

    /// `Done` and `Error` end a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }

    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Connected => "connected",
            StreamEvent::Token { .. } => "token",
            StreamEvent::ToolStart { .. } => "tool_start",
            StreamEvent::ToolEnd { .. } => "tool_end",
            StreamEvent::Done => "done",
            StreamEvent::Error { .. } => "error",
        }
    }
}

impl From<AgentNotification> for StreamEvent {
    fn from(notification: AgentNotification) -> Self {
        match notification {
            AgentNotification::Token(token) => StreamEvent::Token { token },
            AgentNotification::ToolStart {
                call_id,
                name,
                input,
            } => StreamEvent::ToolStart {
                tool: name,
                input,
                call_id: Some(call_id),
            },
            AgentNotification::ToolEnd {
                call_id,
                name,
                output,
                is_error,
            } => StreamEvent::ToolEnd {
                tool: name,
                output,
                call_id: Some(call_id),
                is_error,
            },
        }
    }
}
