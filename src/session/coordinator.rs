//! Stream session coordinator
//!
//! Owns the outbound side of one chat request. Writes `Connected`, drives the
//! workflow engine while forwarding its notifications as frames, then closes
//! with exactly one `Done` or `Error`. Quiet stretches are filled with
//! `:keep-alive` comment frames. If the client goes away the engine is
//! dropped (releasing the model stream and any tool future) and nothing more
//! is written.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::identity::{Credentials, IdentityProvider, UserId};
use super::store::{is_valid_conversation_id, ConversationStore, MAX_CONVERSATION_ID_LEN};
use crate::agent::{notification_channel, AgentState, NotificationReceiver, WorkflowEngine};
use crate::conversation::ConversationMessage;
use crate::core::{ChatError, ChatResult};
use crate::protocol::{encode_comment, encode_event, StreamEvent};

/// A chat request as sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Prior turns, oldest first
    #[serde(default, alias = "history")]
    pub messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub new_message: String,
    #[serde(default, alias = "conversationId")]
    pub chat_id: String,
}

impl ChatRequest {
    pub fn new(
        chat_id: impl Into<String>,
        messages: Vec<ConversationMessage>,
        new_message: impl Into<String>,
    ) -> Self {
        Self {
            messages,
            new_message: new_message.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Check the required fields
    pub fn validate(&self) -> ChatResult<()> {
        if self.new_message.trim().is_empty() {
            return Err(ChatError::malformed("newMessage is required"));
        }
        if self.chat_id.trim().is_empty() {
            return Err(ChatError::malformed("chatId is required"));
        }
        // Checked here so an id the store cannot save is refused up front
        if !is_valid_conversation_id(&self.chat_id) {
            return Err(ChatError::malformed(format!(
                "chatId may only contain letters, digits, '-' and '_' (at most {} characters)",
                MAX_CONVERSATION_ID_LEN
            )));
        }
        Ok(())
    }
}

/// Outbound byte sink of one connection
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Write one frame, waiting while the sink is full
    ///
    /// Fails with `ChatError::Cancelled` once the peer is gone.
    async fn send_frame(&self, frame: Bytes) -> ChatResult<()>;

    /// Resolves when the peer has gone away
    async fn closed(&self);
}

#[async_trait]
impl FrameSink for mpsc::Sender<Bytes> {
    async fn send_frame(&self, frame: Bytes) -> ChatResult<()> {
        self.send(frame).await.map_err(|_| ChatError::Cancelled)
    }

    async fn closed(&self) {
        mpsc::Sender::closed(self).await
    }
}

/// Shared entry point for chat stream sessions
///
/// Built once at startup with its collaborators and cloned into each request.
#[derive(Clone)]
pub struct SessionCoordinator {
    engine: WorkflowEngine,
    store: Arc<dyn ConversationStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl SessionCoordinator {
    pub fn new(
        engine: WorkflowEngine,
        store: Arc<dyn ConversationStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            engine,
            store,
            identity,
        }
    }

    /// Verify the caller; must succeed before a stream is opened
    pub async fn authorize(&self, credentials: &Credentials) -> ChatResult<UserId> {
        self.identity.verify(credentials).await
    }

    /// Run one session to completion
    ///
    /// Returns the final reply when `Done` was written. Any other outcome has
    /// already been reported on the stream, except `ChatError::Cancelled`,
    /// which means the client is gone and nothing more was written.
    pub async fn run<S: FrameSink>(
        &self,
        user: &UserId,
        request: ChatRequest,
        sink: S,
        cancel: CancellationToken,
    ) -> ChatResult<String> {
        let session_id = Uuid::new_v4();
        tracing::info!(
            "[Session] {} started for user {} in conversation {} ({} history messages)",
            session_id,
            user,
            request.chat_id,
            request.messages.len()
        );

        if emit(&sink, &StreamEvent::Connected).await.is_err() {
            tracing::info!("[Session] {} client gone before Connected", session_id);
            return Err(ChatError::Cancelled);
        }

        // The user's message is stored while the engine runs; the reply is
        // appended only after this finishes so the two stay in order.
        let eager_store = {
            let store = self.store.clone();
            let chat_id = request.chat_id.clone();
            let message = ConversationMessage::user(request.new_message.clone());
            tokio::spawn(async move {
                if let Err(e) = store.append(&chat_id, &message).await {
                    tracing::warn!("[Session] Failed to store user message: {}", e);
                }
            })
        };

        let config = self.engine.config();
        let mut state = AgentState::from_request(
            config.system_prompt.as_deref(),
            &request.messages,
            &request.new_message,
        );
        let (notifier, mut notifications) = notification_channel(config.notification_buffer);

        let outcome = {
            let run = self.engine.run(&mut state, &notifier);
            tokio::pin!(run);
            let deadline = deadline(config.request_timeout);
            tokio::pin!(deadline);
            let mut keep_alive = config.keep_alive.map(|period| {
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval
            });

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break Err(ChatError::Cancelled),
                    _ = sink.closed() => break Err(ChatError::Cancelled),
                    _ = &mut deadline => {
                        break Err(ChatError::Timeout(config.request_timeout.unwrap_or_default()))
                    }
                    Some(notification) = notifications.recv() => {
                        if let Err(e) = emit(&sink, &StreamEvent::from(notification)).await {
                            break Err(e);
                        }
                        if let Some(interval) = keep_alive.as_mut() {
                            interval.reset();
                        }
                    }
                    _ = tick(&mut keep_alive) => {
                        tracing::debug!("[Session] -> keep-alive");
                        if let Err(e) = sink.send_frame(encode_comment("keep-alive")).await {
                            break Err(e);
                        }
                    }
                    result = &mut run => break result,
                }
            }
        };

        let reply = match outcome {
            Ok(reply) => reply,
            Err(ChatError::Cancelled) => {
                tracing::info!("[Session] {} cancelled, client disconnected", session_id);
                return Err(ChatError::Cancelled);
            }
            Err(e) => {
                tracing::error!("[Session] {} failed: {}", session_id, e);
                // Tokens produced before the failure still go out first
                drain(&sink, &mut notifications).await?;
                emit(&sink, &StreamEvent::error(e.to_string())).await?;
                return Err(e);
            }
        };

        drain(&sink, &mut notifications).await?;
        emit(&sink, &StreamEvent::Done).await?;
        drop(sink);
        tracing::info!(
            "[Session] {} done, reply {} chars",
            session_id,
            reply.len()
        );

        if let Err(e) = eager_store.await {
            tracing::warn!("[Session] User message store task failed: {}", e);
        }
        if let Err(e) = self
            .store
            .append(&request.chat_id, &ConversationMessage::assistant(reply.clone()))
            .await
        {
            tracing::warn!("[Session] Failed to store reply for {}: {}", request.chat_id, e);
        }

        Ok(reply)
    }
}

async fn emit<S: FrameSink + ?Sized>(sink: &S, event: &StreamEvent) -> ChatResult<()> {
    tracing::debug!("[Session] -> {}", event.kind());
    let frame = encode_event(event)?;
    sink.send_frame(frame).await
}

/// Forward notifications that were queued when the engine stopped
async fn drain<S: FrameSink + ?Sized>(
    sink: &S,
    notifications: &mut NotificationReceiver,
) -> ChatResult<()> {
    while let Ok(notification) = notifications.try_recv() {
        emit(sink, &StreamEvent::from(notification)).await?;
    }
    Ok(())
}

async fn tick(keep_alive: &mut Option<Interval>) {
    match keep_alive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}
