//! Process-local vector store

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::providers::vector_store::{
    cosine_similarity, CollectionInfo, VectorMatch, VectorRecord, VectorStoreProvider,
};

/// Collections held in memory, searched by brute-force cosine similarity
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: DashMap<String, Vec<VectorRecord>>,
}

impl InMemoryVectorStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStore {
    async fn ensure_collection(&self, collection: &str) -> Result<()> {
        self.collections.entry(collection.to_string()).or_default();
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        let mut entry = self.collections.entry(collection.to_string()).or_default();
        for record in records {
            match entry.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => entry.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>> {
        let Some(records) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<VectorMatch> = records
            .iter()
            .map(|r| VectorMatch {
                id: r.id.clone(),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
                similarity: cosine_similarity(embedding, &r.embedding),
            })
            .collect();

        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.collections.get(collection).map_or(0, |r| r.len()))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let mut collections: Vec<CollectionInfo> = self
            .collections
            .iter()
            .map(|entry| CollectionInfo {
                name: entry.key().clone(),
                count: entry.value().len(),
            })
            .collect();
        collections.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(collections)
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.remove(collection).is_some())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
