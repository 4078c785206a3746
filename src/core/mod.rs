//! Core types for the chat streaming service
//!
//! - `ChatError` / `ChatResult` - Error types shared by every layer

pub mod error;

pub use error::{ChatError, ChatResult};
