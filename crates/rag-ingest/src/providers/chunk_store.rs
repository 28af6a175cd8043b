//! Embedding and storage of enriched chunks

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::vector_store::{VectorRecord, VectorStoreProvider};
use crate::types::{ChunkFailure, EnrichedChunk, UpsertReport};

/// Collaborator that embeds and persists a chunk batch
///
/// Returns `Err` only on total failure. Individual chunks that could not be
/// embedded are reported in `UpsertReport::failures` by their batch position.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Embed and store `chunks` into `collection` (default when `None`)
    async fn upsert(&self, chunks: &[EnrichedChunk], collection: Option<&str>) -> Result<UpsertReport>;

    /// Get store name for logging
    fn name(&self) -> &str;
}

/// `ChunkStore` over an embedding provider and a vector store
pub struct EmbeddingStore {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStoreProvider>,
    default_collection: String,
    batch_size: usize,
    batch_delay: Duration,
    error_delay: Duration,
}

impl EmbeddingStore {
    /// Create a store with explicit batching parameters
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStoreProvider>,
        default_collection: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            vectors,
            default_collection: default_collection.into(),
            batch_size: batch_size.max(1),
            batch_delay: Duration::ZERO,
            error_delay: Duration::ZERO,
        }
    }

    /// Create a store using the configured batch size, delays and collection
    pub fn from_config(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        Self::new(
            embedder,
            vectors,
            config.vector_db.default_collection.clone(),
            config.embeddings.batch_size,
        )
        .with_delays(
            Duration::from_millis(config.embeddings.batch_delay_ms),
            Duration::from_millis(config.embeddings.error_delay_ms),
        )
    }

    /// Set the pause between batches and after a failed batch
    pub fn with_delays(mut self, batch_delay: Duration, error_delay: Duration) -> Self {
        self.batch_delay = batch_delay;
        self.error_delay = error_delay;
        self
    }

    /// Collection used when a request names none
    pub fn default_collection(&self) -> &str {
        &self.default_collection
    }
}

#[async_trait]
impl ChunkStore for EmbeddingStore {
    async fn upsert(&self, chunks: &[EnrichedChunk], collection: Option<&str>) -> Result<UpsertReport> {
        let collection = collection.unwrap_or(&self.default_collection);
        if chunks.is_empty() {
            return Ok(UpsertReport::default());
        }

        self.vectors.ensure_collection(collection).await?;

        let batch_count = chunks.len().div_ceil(self.batch_size);
        let mut records = Vec::with_capacity(chunks.len());
        let mut failures = Vec::new();

        for (batch_idx, batch) in chunks.chunks(self.batch_size).enumerate() {
            let offset = batch_idx * self.batch_size;
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            tracing::debug!(
                "[{}] Embedding batch {}/{} ({} chunks)",
                self.embedder.name(),
                batch_idx + 1,
                batch_count,
                batch.len()
            );

            let result = self.embedder.embed_batch(&texts).await.and_then(|embeddings| {
                if embeddings.len() == batch.len() {
                    Ok(embeddings)
                } else {
                    Err(Error::embedding(format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embeddings.len()
                    )))
                }
            });

            match result {
                Ok(embeddings) => {
                    records.extend(batch.iter().zip(embeddings).map(|(chunk, embedding)| {
                        VectorRecord {
                            id: chunk.chunk_id.to_string(),
                            embedding,
                            document: chunk.text.clone(),
                            metadata: chunk.vector_metadata(),
                        }
                    }));
                }
                Err(e) => {
                    tracing::warn!(
                        "[{}] Batch {}/{} failed: {}",
                        self.embedder.name(),
                        batch_idx + 1,
                        batch_count,
                        e
                    );
                    let reason = e.to_string();
                    failures.extend((0..batch.len()).map(|i| ChunkFailure {
                        index: offset + i,
                        reason: reason.clone(),
                    }));
                    if !self.error_delay.is_zero() {
                        tokio::time::sleep(self.error_delay).await;
                    }
                    continue;
                }
            }

            if batch_idx + 1 < batch_count && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        if records.is_empty() {
            return Err(Error::embedding(format!(
                "No documents successfully embedded ({} failed)",
                failures.len()
            )));
        }

        self.vectors.upsert(collection, &records).await?;

        tracing::info!(
            "[{}] Stored {}/{} chunks in '{}'",
            self.vectors.name(),
            records.len(),
            chunks.len(),
            collection
        );

        Ok(UpsertReport {
            requested: chunks.len(),
            stored_ids: records.into_iter().map(|r| r.id).collect(),
            failures,
        })
    }

    fn name(&self) -> &str {
        "embedding-store"
    }
}
