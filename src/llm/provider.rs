//! Model capability trait
//!
//! Abstracts the model behind a streaming interface so the workflow engine
//! never depends on a vendor protocol. A provider streams text fragments as
//! they are generated, then finishes with exactly one `ModelTurn`.

use anyhow::Result;
use futures::stream::Stream;
use std::pin::Pin;

use super::types::ToolDefinition;
use crate::conversation::{Message, ToolCallRequest};

/// The finished outcome of one model invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// A plain reply with no tool calls
    FinalReply { text: String },
    /// The model wants tools executed before it answers
    ToolCallBatch {
        text: String,
        calls: Vec<ToolCallRequest>,
    },
}

impl ModelTurn {
    /// Text portion of the turn
    pub fn text(&self) -> &str {
        match self {
            ModelTurn::FinalReply { text } | ModelTurn::ToolCallBatch { text, .. } => text,
        }
    }
}

/// One item of a model's output stream
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChunk {
    /// Incremental text fragment
    Text(String),
    /// End of generation
    Finished(ModelTurn),
}

/// Boxed stream returned by a model invocation
pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelChunk>> + Send>>;

/// Input to a model invocation
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Trimmed conversation, optionally led by a system message
    pub messages: Vec<Message>,
    /// Tools the model may call
    pub tools: Vec<ToolDefinition>,
}

/// Trait for model providers used by the workflow engine.
///
/// Implementations must be callable concurrently from independent sessions;
/// they hold no per-conversation mutable state.
#[async_trait::async_trait]
pub trait ModelCapability: Send + Sync {
    /// Start a streamed invocation
    async fn invoke(&self, request: ModelRequest) -> Result<ModelStream>;

    /// Get the current model name
    fn model(&self) -> String;

    /// Get the provider name (e.g., "anthropic")
    fn provider_name(&self) -> &str;
}
