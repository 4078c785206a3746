//! Conversation message types
//!
//! `ConversationMessage` is what clients send as history; `Message` is the
//! richer form the agent threads through its workflow (tool calls, tool
//! results, system instructions).

mod message;

pub use message::{ConversationMessage, ConversationRole, Message, Role, ToolCallRequest};
