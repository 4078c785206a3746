pub mod anthropic;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicModel;
pub use provider::{ModelCapability, ModelChunk, ModelRequest, ModelStream, ModelTurn};
pub use types::{ToolDefinition, ToolInputSchema};
