//! The `Tool` trait and the result a tool hands back to the model

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::{ToolDefinition, ToolInputSchema};

/// Output sent back to the model as a `tool_result` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub output: String,
    /// Marks the block as an error for the model
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: message.into(),
            is_error: true,
        }
    }
}

/// A capability the model may invoke during a chat turn
///
/// Tools are shared by every session, so implementations must not keep
/// per-request state.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool; also the `tool` field of
    /// `tool_start`/`tool_end` events
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the tool's input
    fn input_schema(&self) -> ToolInputSchema;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: self.input_schema(),
        }
    }

    /// Execute the tool with the given input
    ///
    /// Returning `Err` signals an execution failure; the registry caller turns
    /// it into an error `ToolResult` for the model.
    async fn execute(&self, input: &Value) -> Result<ToolResult>;
}
