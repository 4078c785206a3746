//! Stream Renderer - prints a live chat event stream to the terminal
//!
//! Tokens are printed inline as they arrive, each tool call is shown as a
//! block opened by `ToolStart` and closed by its `ToolEnd`, and errors go to
//! stderr in red. The renderer also folds the events into a
//! `StreamTranscript` so callers get the assembled reply back.

use anyhow::Result;
use futures::StreamExt;
use serde_json::Value;

use crate::client::{EventStream, StreamTranscript};
use crate::core::ChatError;
use crate::protocol::StreamEvent;

use super::console::Console;

/// Terminal renderer for one event stream
///
/// # Example
///
/// ```ignore
/// let events = client.stream(&request).await?;
/// let transcript = StreamRenderer::new().run(events).await?;
/// ```
pub struct StreamRenderer {
    console: Console,
    show_tools: bool,
    in_text: bool,
    transcript: StreamTranscript,
}

impl StreamRenderer {
    pub fn new() -> Self {
        Self::with_console(Console::new())
    }

    pub fn with_console(console: Console) -> Self {
        Self {
            console,
            show_tools: true,
            in_text: false,
            transcript: StreamTranscript::new(),
        }
    }

    /// Set whether to show tool execution blocks
    pub fn show_tools(mut self, show: bool) -> Self {
        self.show_tools = show;
        self
    }

    /// Render until the stream ends and return what was received
    ///
    /// Malformed frames are reported and skipped; transport errors stop
    /// rendering and are returned.
    pub async fn run(mut self, mut events: EventStream) -> Result<StreamTranscript> {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => self.render(&event),
                Err(e) => match e.downcast_ref::<ChatError>() {
                    Some(ChatError::ProtocolDecode(_)) => {
                        tracing::warn!("[Renderer] Skipping malformed frame: {}", e)
                    }
                    _ => {
                        self.end_text();
                        self.console.print_error(&format!("{:#}", e));
                        return Err(e);
                    }
                },
            }
        }

        self.end_text();
        Ok(self.transcript)
    }

    /// Render one event
    pub fn render(&mut self, event: &StreamEvent) {
        self.transcript.apply(event);

        match event {
            StreamEvent::Connected => tracing::debug!("[Renderer] Connected"),
            StreamEvent::Token { token } => {
                if !self.in_text {
                    self.console.print_assistant_prefix();
                    self.in_text = true;
                }
                self.console.print_assistant_chunk(token);
            }
            StreamEvent::ToolStart { tool, input, .. } => {
                self.end_text();
                if self.show_tools {
                    self.console.print_tool_action(tool, &display_value(input));
                }
            }
            StreamEvent::ToolEnd {
                output, is_error, ..
            } => {
                if self.show_tools {
                    self.console.print_tool_result(&display_value(output), *is_error);
                }
            }
            StreamEvent::Done => self.end_text(),
            StreamEvent::Error { error } => {
                self.end_text();
                self.console.print_error(error);
            }
        }
    }

    pub fn transcript(&self) -> &StreamTranscript {
        &self.transcript
    }

    fn end_text(&mut self) {
        if self.in_text {
            self.console.println();
            self.in_text = false;
        }
    }
}

impl Default for StreamRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Strings print bare, anything else as compact JSON
fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
