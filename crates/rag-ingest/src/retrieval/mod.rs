//! Similarity retrieval over stored chunks

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{CollectionInfo, EmbeddingProvider, VectorStoreProvider};
use crate::types::Metadata;

/// A retrieved chunk with its similarity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// Chunk id in the vector store
    pub id: String,
    /// Chunk text
    pub text: String,
    /// Stored metadata (source, page_number, chunk_index, ...)
    pub metadata: Metadata,
    /// Similarity score (higher is better)
    pub score: f32,
}

/// Embeds queries and searches a collection
pub struct QueryService {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStoreProvider>,
    default_collection: String,
}

impl QueryService {
    /// Create a new query service
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStoreProvider>,
        default_collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            vectors,
            default_collection: default_collection.into(),
        }
    }

    /// Top `top_k` chunks for `question`, most similar first
    pub async fn query(
        &self,
        question: &str,
        top_k: usize,
        collection: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::Config("Query text must not be empty".to_string()));
        }
        let collection = collection.unwrap_or(&self.default_collection);

        let embedding = self.embedder.embed(question).await?;
        let matches = self.vectors.query(collection, &embedding, top_k).await?;

        let mut results: Vec<ScoredChunk> = matches
            .into_iter()
            .map(|m| ScoredChunk {
                id: m.id,
                text: m.document,
                metadata: m.metadata,
                score: m.similarity,
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));

        tracing::debug!(
            "Query returned {} chunks from '{}'",
            results.len(),
            collection
        );
        Ok(results)
    }

    /// Number of chunks stored in a collection
    pub async fn count(&self, collection: Option<&str>) -> Result<usize> {
        self.vectors
            .count(collection.unwrap_or(&self.default_collection))
            .await
    }

    /// Every stored collection with its chunk count
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        self.vectors.list_collections().await
    }

    /// Drop a collection
    pub async fn delete_collection(&self, collection: &str) -> Result<bool> {
        self.vectors.delete_collection(collection).await
    }

    /// Health of the embedder and the vector store
    pub async fn health(&self) -> (bool, bool) {
        let embedder = self.embedder.health_check().await.unwrap_or(false);
        let vectors = self.vectors.health_check().await.unwrap_or(false);
        (embedder, vectors)
    }

    /// Collection used when a request names none
    pub fn default_collection(&self) -> &str {
        &self.default_collection
    }
}
