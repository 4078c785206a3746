//! HTTP client for the chat stream endpoint

use std::pin::Pin;

use anyhow::{bail, Context, Result};
use futures::stream::{Stream, StreamExt};
use reqwest::Client;

use super::transcript::StreamTranscript;
use crate::protocol::{StreamEvent, StreamParser};
use crate::session::ChatRequest;

const STREAM_PATH: &str = "/api/chat/stream";

/// Decoded events of one response, in arrival order
///
/// A frame that fails to decode shows up as an `Err` item and the stream
/// continues; a transport failure is the last item.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Client for a running chat server
#[derive(Debug, Clone)]
pub struct ChatStreamClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ChatStreamClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Use a preconfigured reqwest client
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, STREAM_PATH)
    }

    /// Post a request and stream back its events
    pub async fn stream(&self, request: &ChatRequest) -> Result<EventStream> {
        let mut builder = self.client.post(self.endpoint()).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to reach chat server at {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Chat server returned {}: {}", status, body.trim());
        }

        tracing::debug!("[Client] Stream opened for conversation {}", request.chat_id);

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut parser = StreamParser::new();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for event in parser.feed(&chunk) {
                            yield event.map_err(anyhow::Error::from);
                        }
                    }
                    Err(e) => {
                        yield Err(anyhow::Error::from(e).context("Event stream interrupted"));
                        return;
                    }
                }
            }
            for event in parser.finish() {
                yield event.map_err(anyhow::Error::from);
            }
        };

        Ok(Box::pin(stream))
    }

    /// Run a request to completion and fold its events into a transcript
    ///
    /// Malformed frames are logged and skipped.
    pub async fn collect(&self, request: &ChatRequest) -> Result<StreamTranscript> {
        let mut events = self.stream(request).await?;
        let mut transcript = StreamTranscript::new();

        while let Some(event) = events.next().await {
            match event {
                Ok(event) => transcript.apply(&event),
                Err(e) if is_decode_error(&e) => {
                    tracing::warn!("[Client] Skipping malformed frame: {}", e)
                }
                Err(e) => return Err(e),
            }
        }

        Ok(transcript)
    }
}

fn is_decode_error(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<crate::core::ChatError>(),
        Some(crate::core::ChatError::ProtocolDecode(_))
    )
}
