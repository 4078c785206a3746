//! HTTP routes
//!
//! `POST /api/chat/stream` verifies the caller and the request body, then
//! answers with an event stream fed by a session running on its own task.
//! Rejections happen before any frame is written.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::core::ChatError;
use crate::session::{ChatRequest, Credentials, SessionCoordinator};

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Frames queued per connection before the session waits on the client
const FRAME_BUFFER: usize = 32;

/// Shared state of the HTTP server
#[derive(Clone)]
pub struct AppState {
    coordinator: SessionCoordinator,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(coordinator: SessionCoordinator) -> Self {
        Self {
            coordinator,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancel in-flight sessions when this token fires
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat/stream", post(chat_stream))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn chat_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let credentials = Credentials::from_authorization(
        headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()),
    );
    let user = match state.coordinator.authorize(&credentials).await {
        Ok(user) => user,
        Err(e) => return reject(e),
    };

    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return reject(ChatError::malformed(rejection.body_text())),
    };
    if let Err(e) = request.validate() {
        return reject(e);
    }

    let (sink, frames) = mpsc::channel::<Bytes>(FRAME_BUFFER);
    let coordinator = state.coordinator.clone();
    let cancel = state.shutdown.child_token();
    tokio::spawn(async move {
        if let Err(e) = coordinator.run(&user, request, sink, cancel).await {
            tracing::debug!("[Server] Session ended without Done: {}", e);
        }
    });

    let body = Body::from_stream(ReceiverStream::new(frames).map(Ok::<_, Infallible>));
    (
        [
            (CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (CONNECTION, HeaderValue::from_static("keep-alive")),
            (X_ACCEL_BUFFERING, HeaderValue::from_static("no")),
        ],
        body,
    )
        .into_response()
}

fn reject(error: ChatError) -> Response {
    let status = match &error {
        ChatError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        ChatError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!("[Server] Rejected request ({}): {}", status, error);
    (status, error.to_string()).into_response()
}
