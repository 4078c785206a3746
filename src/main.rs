use std::sync::Arc;

use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;

use chat_stream_agent::agent::WorkflowEngine;
use chat_stream_agent::cli::{Console, StreamRenderer};
use chat_stream_agent::client::ChatStreamClient;
use chat_stream_agent::config::{AppConfig, ClientSettings, LoggingConfig};
use chat_stream_agent::llm::AnthropicModel;
use chat_stream_agent::logging;
use chat_stream_agent::server::{self, AppState};
use chat_stream_agent::session::{
    ChatRequest, JsonlConversationStore, SessionCoordinator, StaticTokenIdentity,
};
use chat_stream_agent::tools::ToolRegistry;

const USAGE: &str = "Usage: chat-stream-agent [serve | ask <message>]";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None | Some("serve") => serve().await,
        Some("ask") if args.len() > 1 => ask(&args[1..].join(" ")).await,
        Some("-h") | Some("--help") => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => bail!("{}", USAGE),
    }
}

async fn serve() -> Result<()> {
    let config = AppConfig::from_env()?;
    let _log_guard = logging::init_logging(&config.logging)?;

    tracing::info!("=== Chat Stream Agent Starting ===");

    // Collaborators are created once here and shared by every session
    let model = Arc::new(AnthropicModel::from_settings(&config.anthropic));
    let tools = Arc::new(ToolRegistry::with_builtins());
    tracing::info!("Registered {} tools", tools.len());

    let identity = StaticTokenIdentity::from_pairs(&config.auth_tokens)?;
    if identity.is_empty() {
        tracing::warn!("CHAT_AUTH_TOKENS is empty, every request will be rejected");
    }

    let store = JsonlConversationStore::with_dir(&config.store_dir);
    tracing::info!("Storing conversations in {:?}", store.base_dir());

    let engine = WorkflowEngine::new(model, tools, Arc::new(config.agent_config()));
    let coordinator = SessionCoordinator::new(engine, Arc::new(store), Arc::new(identity));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
            }
            shutdown.cancel();
        }
    });

    server::serve(config.bind_addr, AppState::new(coordinator), shutdown).await?;

    tracing::info!("=== Chat Stream Agent Shutting Down ===");
    Ok(())
}

async fn ask(message: &str) -> Result<()> {
    let _log_guard = logging::init_logging(&LoggingConfig {
        level: "warn".to_string(),
        ..LoggingConfig::from_env()
    })?;

    let settings = ClientSettings::from_env();
    let mut client = ChatStreamClient::new(settings.server_url);
    if let Some(token) = settings.token {
        client = client.with_token(token);
    }

    Console::new().print_user(message);

    let request = ChatRequest::new(uuid::Uuid::new_v4().to_string(), Vec::new(), message);
    let events = client.stream(&request).await?;
    let transcript = StreamRenderer::new().run(events).await?;

    if !transcript.is_finished() {
        bail!("Stream ended before the server finished the reply");
    }
    Ok(())
}
