//! Client side of the chat event stream

mod http;
mod transcript;

pub use http::{ChatStreamClient, EventStream};
pub use transcript::{StreamTranscript, ToolActivity, TranscriptStatus};
