//! Application state for the ingestion server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::RagChain;
use crate::ingestion::IngestPipeline;
use crate::loaders::SourceLoader;
use crate::providers::{
    ChromaVectorStore, EmbeddingProvider, EmbeddingStore, GeminiClient, GeminiEmbedder,
    InMemoryVectorStore, LlmProvider, VectorStoreProvider,
};
use crate::retrieval::QueryService;
use crate::session::SessionStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    loader: SourceLoader,
    pipeline: IngestPipeline,
    query: Arc<QueryService>,
    sessions: Arc<SessionStore>,
    chain: RagChain,
}

impl AppState {
    /// Build every component from configuration
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing ingestion server state...");

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(GeminiEmbedder::new(&config.embeddings)?);
        tracing::info!(
            "Embedding provider initialized ({}, {} dims)",
            config.embeddings.model,
            config.embeddings.dimensions
        );

        let vectors: Arc<dyn VectorStoreProvider> = if config.vector_db.in_memory {
            tracing::info!("Using in-memory vector store");
            Arc::new(InMemoryVectorStore::new())
        } else {
            tracing::info!("Using Chroma at {}", config.vector_db.url);
            Arc::new(ChromaVectorStore::new(&config.vector_db)?)
        };

        let llm: Arc<dyn LlmProvider> = Arc::new(GeminiClient::new(&config.llm)?);
        tracing::info!("LLM provider initialized ({})", config.llm.model);

        tokio::fs::create_dir_all(&config.server.upload_dir).await?;
        tracing::info!("Uploads stored in {}", config.server.upload_dir.display());

        Self::from_parts(config, embedder, vectors, llm)
    }

    /// Assemble state from already-built providers
    pub fn from_parts(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStoreProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        let store = Arc::new(EmbeddingStore::from_config(
            &config,
            Arc::clone(&embedder),
            Arc::clone(&vectors),
        ));
        let pipeline = IngestPipeline::new(&config, store);
        let query = Arc::new(QueryService::new(
            embedder,
            vectors,
            config.vector_db.default_collection.clone(),
        ));
        let sessions = Arc::new(SessionStore::new());
        let chain = RagChain::new(
            Arc::clone(&query),
            Arc::clone(&sessions),
            llm,
            config.sessions.history_window,
        );
        let loader = SourceLoader::new(&config.datasets)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                loader,
                pipeline,
                query,
                sessions,
                chain,
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get source loader
    pub fn loader(&self) -> &SourceLoader {
        &self.inner.loader
    }

    /// Get ingestion pipeline
    pub fn pipeline(&self) -> &IngestPipeline {
        &self.inner.pipeline
    }

    /// Get query service
    pub fn query(&self) -> &QueryService {
        &self.inner.query
    }

    /// Get answer chain
    pub fn chain(&self) -> &RagChain {
        &self.inner.chain
    }

    /// Get chat sessions
    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }
}
