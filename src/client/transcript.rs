//! Folding a received event stream into a transcript

use serde_json::Value;

use crate::protocol::StreamEvent;

/// One tool call as seen by the client
#[derive(Debug, Clone, PartialEq)]
pub struct ToolActivity {
    pub tool: String,
    pub call_id: Option<String>,
    pub input: Value,
    /// `None` while the tool is still running
    pub output: Option<Value>,
    pub failed: bool,
}

impl ToolActivity {
    pub fn is_running(&self) -> bool {
        self.output.is_none()
    }
}

/// Where the stream is in its lifecycle
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TranscriptStatus {
    #[default]
    Pending,
    Streaming,
    Done,
    Failed(String),
}

/// Reply text and tool activity assembled from stream events
#[derive(Debug, Clone, Default)]
pub struct StreamTranscript {
    reply: String,
    tools: Vec<ToolActivity>,
    status: TranscriptStatus,
}

impl StreamTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event; events after a terminal event are ignored
    pub fn apply(&mut self, event: &StreamEvent) {
        if self.is_finished() {
            tracing::debug!("[Transcript] Ignoring {} after terminal event", event.kind());
            return;
        }

        match event {
            StreamEvent::Connected => self.status = TranscriptStatus::Streaming,
            StreamEvent::Token { token } => self.reply.push_str(token),
            StreamEvent::ToolStart {
                tool,
                input,
                call_id,
            } => self.tools.push(ToolActivity {
                tool: tool.clone(),
                call_id: call_id.clone(),
                input: input.clone(),
                output: None,
                failed: false,
            }),
            StreamEvent::ToolEnd {
                tool,
                output,
                call_id,
                is_error,
            } => match self.find_running(tool, call_id.as_deref()) {
                Some(activity) => {
                    activity.output = Some(output.clone());
                    activity.failed = *is_error;
                }
                None => tracing::debug!("[Transcript] ToolEnd for {} without ToolStart", tool),
            },
            StreamEvent::Done => self.status = TranscriptStatus::Done,
            StreamEvent::Error { error } => self.status = TranscriptStatus::Failed(error.clone()),
        }
    }

    /// The most recent running call matching the id, or the tool name when
    /// no id was sent
    fn find_running(&mut self, tool: &str, call_id: Option<&str>) -> Option<&mut ToolActivity> {
        self.tools.iter_mut().rev().find(|activity| {
            activity.is_running()
                && match call_id {
                    Some(id) => activity.call_id.as_deref() == Some(id),
                    None => activity.tool == tool,
                }
        })
    }

    pub fn reply(&self) -> &str {
        &self.reply
    }

    pub fn tools(&self) -> &[ToolActivity] {
        &self.tools
    }

    pub fn status(&self) -> &TranscriptStatus {
        &self.status
    }

    pub fn is_done(&self) -> bool {
        self.status == TranscriptStatus::Done
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            TranscriptStatus::Done | TranscriptStatus::Failed(_)
        )
    }
}
