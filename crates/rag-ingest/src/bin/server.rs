//! Ingestion server binary
//!
//! Run with: cargo run -p rag-ingest --bin rag-ingest-server [config.toml]

use rag_ingest::{config::RagConfig, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rag_ingest=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Config file from the first argument or RAG_CONFIG
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RAG_CONFIG").ok())
        .map(PathBuf::from);
    let config = RagConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!(
        "  - Vector store: {}",
        if config.vector_db.in_memory { "in-memory" } else { config.vector_db.url.as_str() }
    );
    tracing::info!("  - Default collection: {}", config.vector_db.default_collection);
    tracing::info!("  - Orchestrator min chunk length: {}", config.validation.min_chunk_length);

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
