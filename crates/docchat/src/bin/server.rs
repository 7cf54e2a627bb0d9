//! Document chat server binary
//!
//! Run with: cargo run -p docchat --bin docchat-server -- --config docchat.toml

use clap::Parser;
use docchat::{config::RagConfig, providers::{EmbeddingProvider, LlmProvider}, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "docchat-server",
    version,
    about = "Upload a document and chat with it over HTTP and WebSocket"
)]
struct Args {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docchat=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RagConfig::from_file(path)?,
        None => RagConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.llm.embed_model);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!("  - Passages per query: {}", config.retrieval.top_k);

    let server = RagServer::new(config.clone())?;

    tracing::info!("Checking Ollama at {}...", config.llm.base_url);
    let state = server.state();
    let embedder_ok = matches!(state.embedding_provider().health_check().await, Ok(true));
    let llm_ok = matches!(state.llm_provider().health_check().await, Ok(true));
    match (embedder_ok, llm_ok) {
        (true, true) => tracing::info!("Ollama is running"),
        _ => {
            tracing::warn!("Ollama not available at {}", config.llm.base_url);
            tracing::warn!(
                "Start it with `ollama serve` and pull the models: ollama pull {} && ollama pull {}",
                config.llm.embed_model,
                config.llm.generate_model
            );
        }
    }

    tracing::info!("Endpoints:");
    tracing::info!("  POST /upload             - Upload a .txt or .pdf document");
    tracing::info!("  POST /query              - Ask a question");
    tracing::info!("  GET  /chat/:session_id   - Streaming chat (WebSocket)");
    tracing::info!("  GET  /health             - Health check");

    server.start().await?;

    Ok(())
}
