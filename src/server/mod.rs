//! HTTP transport for chat stream sessions

mod routes;

pub use routes::{router, AppState};

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;

use crate::core::ChatResult;

/// Serve the router until `shutdown` fires
///
/// In-flight sessions are cancelled through the same token, so their streams
/// end and the graceful shutdown can complete.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> ChatResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("[Server] Listening on {}", listener.local_addr()?);

    let app = router(state.with_shutdown(shutdown.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("[Server] Stopped");
    Ok(())
}
