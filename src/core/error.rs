//! Error types for the chat streaming core

use thiserror::Error;

/// Errors that can occur while serving a chat stream
#[derive(Error, Debug)]
pub enum ChatError {
    /// Caller identity missing or invalid
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Request is missing required fields or is not valid JSON
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The model capability failed
    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    /// A tool call failed; reported to the model as an error tool result
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// A wire frame could not be decoded
    #[error("Protocol decode error: {0}")]
    ProtocolDecode(String),

    /// The agent/tools cycle exceeded the configured round limit
    #[error("Generation aborted after {0} model rounds without a final reply")]
    RunawayLoop(usize),

    /// The request exceeded its wall-clock budget
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The client went away or the session was cancelled
    #[error("Session cancelled")]
    Cancelled,

    /// Persistence collaborator failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChatError {
    /// Create a model invocation error from anything displayable
    pub fn model(msg: impl Into<String>) -> Self {
        ChatError::ModelInvocation(msg.into())
    }

    /// Create a malformed request error
    pub fn malformed(msg: impl Into<String>) -> Self {
        ChatError::MalformedRequest(msg.into())
    }
}

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;
