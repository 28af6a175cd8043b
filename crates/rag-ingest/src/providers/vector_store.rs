//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;
use serde::Serialize;
use crate::error::Result;
use crate::types::Metadata;

/// One vector with its document text and primitive metadata
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: Metadata,
}

/// Search result from vector store
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    /// Similarity score (higher is more similar)
    pub similarity: f32,
}

/// A stored collection and its size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub count: usize,
}

/// Trait for named-collection vector storage and similarity search
///
/// Implementations:
/// - `ChromaVectorStore`: Chroma HTTP server
/// - `InMemoryVectorStore`: process-local collections
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Create the collection if it does not exist
    async fn ensure_collection(&self, collection: &str) -> Result<()>;

    /// Insert or replace records by id
    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()>;

    /// Nearest records to `embedding`, most similar first
    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>>;

    /// Number of records in a collection
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Every collection with its record count, ordered by name
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;

    /// Drop a collection; returns whether it existed
    async fn delete_collection(&self, collection: &str) -> Result<bool>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Cosine similarity; zero when either vector has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
