//! Chat stream sessions
//!
//! This module provides `SessionCoordinator`, which turns one verified chat
//! request into an ordered event stream, and the collaborators it is built
//! with: a `ConversationStore` for persistence and an `IdentityProvider` for
//! caller verification.

pub mod coordinator;
pub mod identity;
pub mod store;

pub use coordinator::{ChatRequest, FrameSink, SessionCoordinator};
pub use identity::{Credentials, IdentityProvider, StaticTokenIdentity, UserId};
pub use store::{
    is_valid_conversation_id, ConversationStore, JsonlConversationStore,
    MemoryConversationStore, StoredMessage,
};
