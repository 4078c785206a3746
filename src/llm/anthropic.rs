//! Anthropic Messages API provider
//!
//! Streams responses over SSE and translates them into `ModelChunk`s.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use super::provider::{ModelCapability, ModelChunk, ModelRequest, ModelStream, ModelTurn};
use super::types::{
    ApiMessage, ContentBlock, ContentBlockStart, ContentDelta, MessageRequest,
    RawStreamEvent, StopReason, SystemBlock,
};
use crate::config::AnthropicSettings;
use crate::conversation::{Message, Role, ToolCallRequest};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROMPT_CACHING_BETA: &str = "prompt-caching-2024-07-31";

/// Anthropic LLM provider
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AnthropicModel {
    /// Create a provider with the default model settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            temperature: Some(0.7),
        }
    }

    /// Create a provider from loaded settings
    pub fn from_settings(settings: &AnthropicSettings) -> Self {
        tracing::info!("Creating Anthropic provider");
        tracing::info!("Using model: {}", settings.model);
        tracing::info!("Max tokens: {}", settings.max_tokens);

        let mut provider = Self::new(settings.api_key.clone())
            .with_model(settings.model.clone())
            .with_max_tokens(settings.max_tokens)
            .with_temperature(settings.temperature);
        if let Some(url) = &settings.base_url {
            provider = provider.with_api_url(url.clone());
        }
        provider
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the max tokens for responses
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Override the messages endpoint (proxies, test servers)
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Build the API request body for a model request
    pub fn build_request(&self, request: &ModelRequest) -> MessageRequest {
        let (system, messages) = convert_messages(&request.messages);
        MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages,
            system,
            tools: request.tools.clone(),
            temperature: self.temperature,
            stream: Some(true),
        }
    }
}

/// Split off system messages and convert the rest to API format.
///
/// Tool results become `tool_result` blocks on a user message, and
/// consecutive messages with the same API role are merged.
fn convert_messages(messages: &[Message]) -> (Vec<SystemBlock>, Vec<ApiMessage>) {
    let mut system = Vec::new();
    let mut converted: Vec<ApiMessage> = Vec::new();

    for msg in messages {
        let (role, blocks) = match msg.role {
            Role::System => {
                system.push(SystemBlock::new(&msg.content).cached());
                continue;
            }
            Role::User => ("user", vec![ContentBlock::text(&msg.content)]),
            Role::Assistant => {
                let mut blocks = Vec::new();
                if !msg.content.is_empty() {
                    blocks.push(ContentBlock::text(&msg.content));
                }
                for call in &msg.tool_calls {
                    blocks.push(ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                    });
                }
                ("assistant", blocks)
            }
            Role::Tool => {
                let id = msg.tool_call_id.clone().unwrap_or_default();
                ("user", vec![ContentBlock::tool_result(id, &msg.content, msg.is_error)])
            }
        };

        if blocks.is_empty() {
            continue;
        }

        match converted.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => converted.push(ApiMessage {
                role: role.to_string(),
                content: blocks,
            }),
        }
    }

    (system, converted)
}

/// Tool call being assembled from `input_json_delta` fragments
#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    json: String,
}

impl PendingToolCall {
    fn finish(self) -> ToolCallRequest {
        let arguments = if self.json.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(&self.json) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("[Anthropic] Tool input for {} is not valid JSON: {}", self.name, e);
                    Value::String(self.json)
                }
            }
        };
        ToolCallRequest::new(self.id, self.name, arguments)
    }
}

#[async_trait::async_trait]
impl ModelCapability for AnthropicModel {
    async fn invoke(&self, request: ModelRequest) -> Result<ModelStream> {
        let body = self.build_request(&request);
        tracing::debug!(
            "[Anthropic] Streaming request: {} messages, {} tools",
            body.messages.len(),
            body.tools.len()
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("anthropic-beta", PROMPT_CACHING_BETA)
            .json(&body)
            .send()
            .await
            .context("Failed to send streaming request to Anthropic API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            tracing::error!("[Anthropic] Streaming API error: {} - {}", status, error_text);
            anyhow::bail!("Anthropic API error ({}): {}", status, error_text);
        }

        tracing::info!("[Anthropic] Streaming response started");

        let byte_stream = response.bytes_stream();
        let stream_reader = StreamReader::new(
            byte_stream.map(|result| result.map_err(|e| std::io::Error::other(e.to_string()))),
        );
        let buf_reader = tokio::io::BufReader::new(stream_reader);

        let stream = async_stream::try_stream! {
            let mut lines = buf_reader.lines();
            let mut text = String::new();
            let mut tools: BTreeMap<usize, PendingToolCall> = BTreeMap::new();
            let mut stop_reason: Option<StopReason> = None;
            let mut finished = false;

            while let Some(line) = lines.next_line().await? {
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim_start();
                if data.is_empty() {
                    continue;
                }

                let event: RawStreamEvent = match serde_json::from_str(data) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!("[Anthropic] Skipping unrecognised stream event: {}", e);
                        continue;
                    }
                };

                match event {
                    RawStreamEvent::ContentBlockStart { index, content_block } => {
                        if let ContentBlockStart::ToolUse { id, name } = content_block {
                            tools.insert(index, PendingToolCall { id, name, json: String::new() });
                        }
                    }
                    RawStreamEvent::ContentBlockDelta { index, delta } => match delta {
                        ContentDelta::TextDelta { text: fragment } => {
                            if !fragment.is_empty() {
                                text.push_str(&fragment);
                                yield ModelChunk::Text(fragment);
                            }
                        }
                        ContentDelta::InputJsonDelta { partial_json } => {
                            if let Some(tool) = tools.get_mut(&index) {
                                tool.json.push_str(&partial_json);
                            }
                        }
                        ContentDelta::ThinkingDelta { .. } | ContentDelta::SignatureDelta { .. } => {}
                    },
                    RawStreamEvent::MessageDelta { delta } => {
                        stop_reason = delta.stop_reason;
                    }
                    RawStreamEvent::MessageStop => {
                        finished = true;
                        break;
                    }
                    RawStreamEvent::Error { error } => {
                        tracing::error!("[Anthropic] Stream error: {}: {}", error.error_type, error.message);
                        Err(anyhow::anyhow!("Anthropic stream error ({}): {}", error.error_type, error.message))?;
                    }
                    RawStreamEvent::MessageStart { .. }
                    | RawStreamEvent::ContentBlockStop { .. }
                    | RawStreamEvent::Ping => {}
                }
            }

            if !finished {
                Err(anyhow::anyhow!("Anthropic stream ended before message_stop"))?;
            }

            tracing::debug!("[Anthropic] Stream complete: stop_reason={:?}", stop_reason);

            let calls: Vec<ToolCallRequest> = tools.into_values().map(PendingToolCall::finish).collect();
            let turn = if calls.is_empty() {
                ModelTurn::FinalReply { text }
            } else {
                ModelTurn::ToolCallBatch { text, calls }
            };
            yield ModelChunk::Finished(turn);
        };

        Ok(Box::pin(stream))
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_convert_messages_splits_system_and_merges_tool_results() {
        let messages = vec![
            Message::system("be helpful"),
            Message::user("2+2 and 3+3?"),
            Message::assistant_with_tool_calls(
                "",
                vec![
                    ToolCallRequest::new("a", "calculator", json!({"expression": "2+2"})),
                    ToolCallRequest::new("b", "calculator", json!({"expression": "3+3"})),
                ],
            ),
            Message::tool_result("a", "4", false),
            Message::tool_result("b", "6", false),
        ];

        let (system, converted) = convert_messages(&messages);
        assert_eq!(system.len(), 1);
        assert!(system[0].cache_control.is_some());
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[1].role, "assistant");
        assert_eq!(converted[1].content.len(), 2);
        assert_eq!(converted[2].role, "user");
        assert_eq!(converted[2].content.len(), 2);
    }

    #[test]
    fn test_build_request_binds_tools() {
        let provider = AnthropicModel::new("key").with_model("test-model");
        let request = ModelRequest {
            messages: vec![Message::user("hi")],
            tools: vec![crate::llm::ToolDefinition {
                name: "calculator".into(),
                description: None,
                input_schema: Default::default(),
            }],
        };
        let body = provider.build_request(&request);
        assert_eq!(body.model, "test-model");
        assert_eq!(body.tools.len(), 1);
        assert_eq!(body.stream, Some(true));
    }

    #[test]
    fn test_pending_tool_call_parses_arguments() {
        let call = PendingToolCall {
            id: "t".into(),
            name: "calculator".into(),
            json: r#"{"expression":"2+2"}"#.into(),
        }
        .finish();
        assert_eq!(call.arguments, json!({"expression": "2+2"}));

        let empty = PendingToolCall {
            id: "t".into(),
            name: "current_time".into(),
            json: String::new(),
        }
        .finish();
        assert_eq!(empty.arguments, json!({}));
    }
}
