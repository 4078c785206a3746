//! Scripted collaborators shared by unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::agent::{AgentNotification, NotificationReceiver};
use crate::conversation::{ConversationMessage, ToolCallRequest};
use crate::core::{ChatError, ChatResult};
use crate::llm::{
    ModelCapability, ModelChunk, ModelRequest, ModelStream, ModelTurn, ToolInputSchema,
};
use crate::protocol::{StreamEvent, StreamParser};
use crate::session::ConversationStore;
use crate::tools::{Tool, ToolResult};

/// One scripted model invocation
pub(crate) enum ScriptedTurn {
    Finish {
        tokens: Vec<String>,
        turn: ModelTurn,
    },
    FailInvoke(String),
    FailMidStream {
        tokens: Vec<String>,
        error: String,
    },
    Unfinished(Vec<String>),
    Endless(String),
    Hang,
}

fn owned(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

impl ScriptedTurn {
    /// Stream `tokens`, then finish with their concatenation as the reply
    pub fn reply(tokens: &[&str]) -> Self {
        ScriptedTurn::Finish {
            tokens: owned(tokens),
            turn: ModelTurn::FinalReply {
                text: tokens.concat(),
            },
        }
    }

    pub fn tool_calls(tokens: &[&str], calls: Vec<ToolCallRequest>) -> Self {
        ScriptedTurn::Finish {
            tokens: owned(tokens),
            turn: ModelTurn::ToolCallBatch {
                text: tokens.concat(),
                calls,
            },
        }
    }

    pub fn fail_invoke(message: &str) -> Self {
        ScriptedTurn::FailInvoke(message.to_string())
    }

    pub fn fail_mid_stream(tokens: &[&str], error: &str) -> Self {
        ScriptedTurn::FailMidStream {
            tokens: owned(tokens),
            error: error.to_string(),
        }
    }

    /// Stream tokens and end without a finished turn
    pub fn unfinished(tokens: &[&str]) -> Self {
        ScriptedTurn::Unfinished(owned(tokens))
    }

    /// Stream the same token forever
    pub fn endless(token: &str) -> Self {
        ScriptedTurn::Endless(token.to_string())
    }

    /// Never produce anything
    pub fn hang() -> Self {
        ScriptedTurn::Hang
    }
}

fn chunk(chunk: ModelChunk) -> Result<ModelChunk> {
    Ok(chunk)
}

/// Sets its flag when dropped together with the stream that owns it
struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Model that plays back scripted turns in order and records its requests
pub(crate) struct ScriptedModel {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<ModelRequest>>,
    released: Arc<AtomicBool>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn invocations(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> Option<ModelRequest> {
        self.requests.lock().unwrap().get(index).cloned()
    }

    /// Flag set once a stream produced by this model has been dropped
    pub fn released(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }
}

#[async_trait]
impl ModelCapability for ScriptedModel {
    async fn invoke(&self, request: ModelRequest) -> Result<ModelStream> {
        self.requests.lock().unwrap().push(request);
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("script exhausted"))?;
        let guard = ReleaseGuard(self.released.clone());

        let stream: ModelStream = match turn {
            ScriptedTurn::FailInvoke(message) => bail!(message),
            ScriptedTurn::Finish { tokens, turn } => Box::pin(async_stream::stream! {
                let _guard = guard;
                for token in tokens {
                    yield chunk(ModelChunk::Text(token));
                }
                yield chunk(ModelChunk::Finished(turn));
            }),
            ScriptedTurn::FailMidStream { tokens, error } => Box::pin(async_stream::stream! {
                let _guard = guard;
                for token in tokens {
                    yield chunk(ModelChunk::Text(token));
                }
                yield Err(anyhow!(error));
            }),
            ScriptedTurn::Unfinished(tokens) => Box::pin(async_stream::stream! {
                let _guard = guard;
                for token in tokens {
                    yield chunk(ModelChunk::Text(token));
                }
            }),
            ScriptedTurn::Endless(token) => Box::pin(async_stream::stream! {
                let _guard = guard;
                loop {
                    yield chunk(ModelChunk::Text(token.clone()));
                    tokio::task::yield_now().await;
                }
            }),
            ScriptedTurn::Hang => Box::pin(async_stream::stream! {
                let _guard = guard;
                std::future::pending::<()>().await;
                yield chunk(ModelChunk::Text(String::new()));
            }),
        };
        Ok(stream)
    }

    fn model(&self) -> String {
        "scripted".to_string()
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

/// Tool whose every execution fails
pub(crate) struct FailingTool {
    name: String,
}

impl FailingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn input_schema(&self) -> ToolInputSchema {
        ToolInputSchema::new()
    }

    async fn execute(&self, _input: &Value) -> Result<ToolResult> {
        bail!("service unavailable")
    }
}

/// Store whose every append fails
pub(crate) struct FailingStore;

#[async_trait]
impl ConversationStore for FailingStore {
    async fn append(&self, _conversation_id: &str, _message: &ConversationMessage) -> ChatResult<()> {
        Err(ChatError::Persistence("disk full".into()))
    }
}

/// Collect notifications until every sender is gone
pub(crate) async fn collect_notifications(mut rx: NotificationReceiver) -> Vec<AgentNotification> {
    let mut notifications = Vec::new();
    while let Some(notification) = rx.recv().await {
        notifications.push(notification);
    }
    notifications
}

/// Decode every frame written to a channel sink
pub(crate) async fn read_events(mut rx: mpsc::Receiver<Bytes>) -> Vec<StreamEvent> {
    let mut parser = StreamParser::new();
    let mut events = Vec::new();
    while let Some(frame) = rx.recv().await {
        events.extend(parser.feed(&frame).into_iter().map(|e| e.unwrap()));
    }
    events.extend(parser.finish().into_iter().map(|e| e.unwrap()));
    events
}
