//! Incremental event stream parser
//!
//! Feeds on raw byte chunks whose boundaries are arbitrary. Bytes are only
//! decoded once a whole frame has arrived, so a frame (or a multi-byte
//! character) split across chunks is reassembled before it is parsed.

use super::event::StreamEvent;
use crate::core::{ChatError, ChatResult};

/// Client-side decoder for a chat event stream
#[derive(Debug, Default)]
pub struct StreamParser {
    buffer: Vec<u8>,
    /// Bytes before this offset are known not to contain a frame boundary
    scanned: usize,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every event completed by it, in order
    ///
    /// A malformed frame yields an `Err` entry in its position; frames after
    /// it decode normally.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ChatResult<StreamEvent>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;

        while let Some((frame_end, delimiter_len)) =
            find_frame_boundary(&self.buffer, consumed.max(self.scanned))
        {
            if let Some(event) = decode_frame(&self.buffer[consumed..frame_end]) {
                events.push(event);
            }
            consumed = frame_end + delimiter_len;
        }

        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        // Keep the last two bytes in play: they may start a delimiter that
        // the next chunk completes.
        self.scanned = self.buffer.len().saturating_sub(2);

        events
    }

    /// Flush a trailing frame that was never terminated
    ///
    /// Call once the byte stream has ended.
    pub fn finish(&mut self) -> Vec<ChatResult<StreamEvent>> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;

        decode_frame(&rest).into_iter().collect()
    }

    /// Number of bytes waiting for the rest of their frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Locate the end of the next frame at or after `from`
///
/// Returns the offset of the newline that ends the frame's last line and the
/// length of the blank-line delimiter starting there (`\n\n` or `\n\r\n`).
fn find_frame_boundary(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut start = from;
    while let Some(pos) = buffer.get(start..)?.iter().position(|b| *b == b'\n') {
        let newline = start + pos;
        match buffer.get(newline + 1) {
            Some(b'\n') => return Some((newline, 2)),
            Some(b'\r') if buffer.get(newline + 2) == Some(&b'\n') => return Some((newline, 3)),
            _ => start = newline + 1,
        }
    }
    None
}

/// Decode one frame; `None` when it carries no data lines
fn decode_frame(frame: &[u8]) -> Option<ChatResult<StreamEvent>> {
    let text = match std::str::from_utf8(frame) {
        Ok(text) => text,
        Err(e) => {
            return Some(Err(ChatError::ProtocolDecode(format!(
                "Frame is not valid UTF-8: {}",
                e
            ))))
        }
    };

    let mut data_lines = Vec::new();
    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(data) = line.strip_prefix("data:") {
            data_lines.push(data.strip_prefix(' ').unwrap_or(data));
        }
        // Other fields (event:, id:, retry:) carry nothing this protocol uses
    }

    if data_lines.is_empty() {
        return None;
    }

    let payload = data_lines.join("\n");
    Some(serde_json::from_str::<StreamEvent>(&payload).map_err(|e| {
        tracing::debug!("[Parser] Malformed frame payload: {}", payload);
        ChatError::ProtocolDecode(format!("Invalid event payload: {}", e))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_event;
    use serde_json::json;

    fn sample_events() -> Vec<StreamEvent> {
        vec![
            StreamEvent::Connected,
            StreamEvent::ToolStart {
                tool: "calculator".into(),
                input: json!("2+2"),
                call_id: Some("call_1".into()),
            },
            StreamEvent::ToolEnd {
                tool: "calculator".into(),
                output: json!("4"),
                call_id: Some("call_1".into()),
                is_error: false,
            },
            StreamEvent::token("The"),
            StreamEvent::token(" answer is 4 \u{1F30D} h\u{e9}llo\nnext line"),
            StreamEvent::error("Model unavailable"),
            StreamEvent::Done,
        ]
    }

    fn encoded(events: &[StreamEvent]) -> Vec<u8> {
        events
            .iter()
            .flat_map(|e| encode_event(e).unwrap().to_vec())
            .collect()
    }

    fn ok_events(results: Vec<ChatResult<StreamEvent>>) -> Vec<StreamEvent> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_single_chunk() {
        let events = sample_events();
        let mut parser = StreamParser::new();
        assert_eq!(ok_events(parser.feed(&encoded(&events))), events);
        assert_eq!(parser.buffered_len(), 0);
    }

    #[test]
    fn test_split_at_every_offset() {
        let events = sample_events();
        let bytes = encoded(&events);

        for split in 0..=bytes.len() {
            let mut parser = StreamParser::new();
            let mut decoded = ok_events(parser.feed(&bytes[..split]));
            decoded.extend(ok_events(parser.feed(&bytes[split..])));
            assert_eq!(decoded, events, "split at byte {}", split);
        }
    }

    #[test]
    fn test_byte_by_byte() {
        let events = sample_events();
        let mut parser = StreamParser::new();
        let mut decoded = Vec::new();
        for byte in encoded(&events) {
            decoded.extend(ok_events(parser.feed(&[byte])));
        }
        assert_eq!(decoded, events);
    }

    #[test]
    fn test_incomplete_frame_stays_buffered() {
        let mut parser = StreamParser::new();
        assert!(parser.feed(b"data: {\"type\":\"tok").is_empty());
        assert!(parser.feed(b"en\",\"token\":\"a\"}\n").is_empty());
        assert_eq!(ok_events(parser.feed(b"\n")), vec![StreamEvent::token("a")]);
    }

    #[test]
    fn test_malformed_frame_is_isolated() {
        let mut parser = StreamParser::new();
        let mut bytes = encode_event(&StreamEvent::Connected).unwrap().to_vec();
        bytes.extend_from_slice(b"data: {not json}\n\n");
        bytes.extend_from_slice(b"data: {\"type\":\"unknown\"}\n\n");
        bytes.extend_from_slice(&encode_event(&StreamEvent::token("ok")).unwrap());

        let results = parser.feed(&bytes);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap(), &StreamEvent::Connected);
        assert!(matches!(results[1], Err(ChatError::ProtocolDecode(_))));
        assert!(matches!(results[2], Err(ChatError::ProtocolDecode(_))));
        assert_eq!(results[3].as_ref().unwrap(), &StreamEvent::token("ok"));
    }

    #[test]
    fn test_invalid_utf8_is_a_decode_error() {
        let mut parser = StreamParser::new();
        let results = parser.feed(b"data: \xff\xfe\n\ndata: {\"type\":\"done\"}\n\n");
        assert!(matches!(results[0], Err(ChatError::ProtocolDecode(_))));
        assert_eq!(results[1].as_ref().unwrap(), &StreamEvent::Done);
    }

    #[test]
    fn test_crlf_delimiters() {
        let mut parser = StreamParser::new();
        let events = ok_events(
            parser.feed(b"data: {\"type\":\"connected\"}\r\n\r\ndata: {\"type\":\"done\"}\r\n\r\n"),
        );
        assert_eq!(events, vec![StreamEvent::Connected, StreamEvent::Done]);
    }

    #[test]
    fn test_comments_and_empty_frames_are_skipped() {
        let mut parser = StreamParser::new();
        let events = ok_events(parser.feed(
            b":keep-alive\n\n\n\nevent: message\ndata: {\"type\":\"done\"}\n\n",
        ));
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn test_multiple_data_lines_are_joined() {
        let mut parser = StreamParser::new();
        let events = ok_events(parser.feed(b"data: {\"type\":\"token\",\ndata: \"token\":\"x\"}\n\n"));
        assert_eq!(events, vec![StreamEvent::token("x")]);
    }

    #[test]
    fn test_prefix_without_space() {
        let mut parser = StreamParser::new();
        let events = ok_events(parser.feed(b"data:{\"type\":\"done\"}\n\n"));
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn test_finish_flushes_trailing_frame() {
        let mut parser = StreamParser::new();
        assert!(parser.feed(b"data: {\"type\":\"done\"}").is_empty());
        assert_eq!(ok_events(parser.finish()), vec![StreamEvent::Done]);
        assert_eq!(parser.buffered_len(), 0);
        assert!(parser.finish().is_empty());
    }
}
