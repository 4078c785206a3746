//! Event encoder
//!
//! Turns one `StreamEvent` into one self-delimited frame:
//! `data: {"type":"token","token":"Hi"}\n\n`.

use bytes::{BufMut, Bytes, BytesMut};

use super::event::{StreamEvent, SSE_DATA_PREFIX, SSE_FRAME_DELIMITER};
use crate::core::ChatResult;

/// Encode an event as a single frame
pub fn encode_event(event: &StreamEvent) -> ChatResult<Bytes> {
    // serde_json escapes newlines inside strings, so the payload is one line
    let payload = serde_json::to_vec(event)?;

    let mut frame =
        BytesMut::with_capacity(SSE_DATA_PREFIX.len() + payload.len() + SSE_FRAME_DELIMITER.len());
    frame.put_slice(SSE_DATA_PREFIX.as_bytes());
    frame.put_slice(&payload);
    frame.put_slice(SSE_FRAME_DELIMITER.as_bytes());
    Ok(frame.freeze())
}

/// Encode a comment frame, ignored by parsers (used as a keep-alive)
pub fn encode_comment(text: &str) -> Bytes {
    let line = text.replace(['\r', '\n'], " ");
    Bytes::from(format!(":{}{}", line, SSE_FRAME_DELIMITER))
}
