//! Chat event stream protocol
//!
//! Frames are Server-Sent-Events style: `data: <json>\n\n`, one
//! `StreamEvent` per frame. `encode_event` produces frames on the server,
//! `StreamParser` reassembles them from arbitrarily chunked bytes on the
//! client.

mod encoder;
mod event;
mod parser;

pub use encoder::{encode_comment, encode_event};
pub use event::{StreamEvent, SSE_DATA_PREFIX, SSE_FRAME_DELIMITER};
pub use parser::StreamParser;
