//! Agent workflow engine
//!
//! Alternates between asking the model (`Agent`) and running the tool calls
//! it requested (`Tools`) until the model produces a reply without tool calls:
//!
//! ```text
//! Start -> Agent --(tool calls)--> Tools --> Agent ... --(no tool calls)--> End
//! ```
//!
//! While it runs, the engine reports tokens and tool lifecycle events through
//! a bounded channel. Those notifications never steer the state machine; a
//! closed channel only means nobody is listening anymore, which cancels the
//! run.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use super::config::AgentConfig;
use super::state::AgentState;
use super::trimmer::trim_history;
use crate::conversation::{Message, ToolCallRequest};
use crate::core::{ChatError, ChatResult};
use crate::llm::{ModelCapability, ModelChunk, ModelRequest, ModelTurn};
use crate::tools::{ToolRegistry, ToolResult};

/// Observer notifications emitted while the workflow runs
#[derive(Debug, Clone, PartialEq)]
pub enum AgentNotification {
    /// Incremental model text
    Token(String),
    /// A tool call is about to execute
    ToolStart {
        call_id: String,
        name: String,
        input: Value,
    },
    /// A tool call finished (successfully or not)
    ToolEnd {
        call_id: String,
        name: String,
        output: Value,
        is_error: bool,
    },
}

/// Sending half used by the engine to publish notifications
pub type NotificationSender = mpsc::Sender<AgentNotification>;

/// Receiving half consumed by the stream session
pub type NotificationReceiver = mpsc::Receiver<AgentNotification>;

/// Create a bounded notification channel
pub fn notification_channel(capacity: usize) -> (NotificationSender, NotificationReceiver) {
    mpsc::channel(capacity.max(1))
}

enum WorkflowStep {
    Agent,
    Tools(Vec<ToolCallRequest>),
    End,
}

/// Runs the Agent/Tools state machine for one request
///
/// The engine itself is stateless between runs; all per-request data lives in
/// the `AgentState` passed to [`WorkflowEngine::run`].
#[derive(Clone)]
pub struct WorkflowEngine {
    model: Arc<dyn ModelCapability>,
    tools: Arc<ToolRegistry>,
    config: Arc<AgentConfig>,
}

impl WorkflowEngine {
    pub fn new(
        model: Arc<dyn ModelCapability>,
        tools: Arc<ToolRegistry>,
        config: Arc<AgentConfig>,
    ) -> Self {
        Self {
            model,
            tools,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Drive the workflow to completion and return the final reply text
    pub async fn run(
        &self,
        state: &mut AgentState,
        notifier: &NotificationSender,
    ) -> ChatResult<String> {
        let mut step = WorkflowStep::Agent;
        let mut rounds = 0usize;

        loop {
            step = match step {
                WorkflowStep::Agent => {
                    if rounds >= self.config.max_rounds {
                        tracing::warn!(
                            "[Workflow] Max rounds ({}) reached without a final reply",
                            self.config.max_rounds
                        );
                        return Err(ChatError::RunawayLoop(self.config.max_rounds));
                    }
                    rounds += 1;

                    match self.agent_step(state, notifier, rounds).await? {
                        ModelTurn::ToolCallBatch { text, calls } if !calls.is_empty() => {
                            tracing::info!(
                                "[Workflow] Round {} requested {} tool call(s)",
                                rounds,
                                calls.len()
                            );
                            state.push(Message::assistant_with_tool_calls(text, calls.clone()));
                            WorkflowStep::Tools(calls)
                        }
                        turn => {
                            state.push(Message::assistant(turn.text()));
                            WorkflowStep::End
                        }
                    }
                }

                WorkflowStep::Tools(calls) => {
                    self.tools_step(state, calls, notifier).await?;
                    WorkflowStep::Agent
                }

                WorkflowStep::End => {
                    let reply = state.final_reply().unwrap_or_default().to_string();
                    tracing::info!(
                        "[Workflow] Completed after {} round(s), reply {} chars",
                        rounds,
                        reply.len()
                    );
                    return Ok(reply);
                }
            };
        }
    }

    /// Invoke the model once, forwarding text fragments as they arrive
    async fn agent_step(
        &self,
        state: &AgentState,
        notifier: &NotificationSender,
        round: usize,
    ) -> ChatResult<ModelTurn> {
        let messages = trim_history(state.messages(), &self.config.trim_policy);
        tracing::info!(
            "[Workflow] Calling model {} with {} of {} messages (round {})",
            self.model.model(),
            messages.len(),
            state.len(),
            round
        );

        let request = ModelRequest {
            messages,
            tools: self.tools.definitions(),
        };

        let mut stream = self
            .model
            .invoke(request)
            .await
            .map_err(|e| ChatError::model(format!("{:#}", e)))?;

        let mut streamed = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk.map_err(|e| ChatError::model(format!("{:#}", e)))? {
                ModelChunk::Text(fragment) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    streamed.push_str(&fragment);
                    notify(notifier, AgentNotification::Token(fragment)).await?;
                }
                ModelChunk::Finished(turn) => return Ok(with_streamed_text(turn, streamed)),
            }
        }

        Err(ChatError::model("Model stream ended without a finished message"))
    }

    /// Execute every pending tool call in request order
    async fn tools_step(
        &self,
        state: &mut AgentState,
        calls: Vec<ToolCallRequest>,
        notifier: &NotificationSender,
    ) -> ChatResult<()> {
        for call in calls {
            notify(
                notifier,
                AgentNotification::ToolStart {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                },
            )
            .await?;

            let result = match self.tools.execute(&call.name, &call.arguments).await {
                Ok(result) => result,
                Err(e) => {
                    let failure = ChatError::ToolExecution(format!("{:#}", e));
                    tracing::warn!("[Workflow] Tool {} ({}): {}", call.name, call.id, failure);
                    ToolResult::error(failure.to_string())
                }
            };

            state.push(Message::tool_result(&call.id, &result.output, result.is_error));

            notify(
                notifier,
                AgentNotification::ToolEnd {
                    call_id: call.id,
                    name: call.name,
                    output: Value::String(result.output),
                    is_error: result.is_error,
                },
            )
            .await?;
        }
        Ok(())
    }
}

async fn notify(notifier: &NotificationSender, notification: AgentNotification) -> ChatResult<()> {
    notifier
        .send(notification)
        .await
        .map_err(|_| ChatError::Cancelled)
}

/// Providers may leave the finished text empty and rely on the streamed
/// fragments; fill it in so the state carries the full reply.
fn with_streamed_text(turn: ModelTurn, streamed: String) -> ModelTurn {
    if !turn.text().is_empty() || streamed.is_empty() {
        return turn;
    }
    match turn {
        ModelTurn::FinalReply { .. } => ModelTurn::FinalReply { text: streamed },
        ModelTurn::ToolCallBatch { calls, .. } => ModelTurn::ToolCallBatch {
            text: streamed,
            calls,
        },
    }
}
