//! Chroma vector database over its HTTP API

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::providers::vector_store::{
    CollectionInfo, VectorMatch, VectorRecord, VectorStoreProvider,
};
use crate::types::Metadata;

/// Chroma client with a collection-id cache
pub struct ChromaVectorStore {
    client: reqwest::Client,
    base_url: String,
    distance: String,
    /// Collection name to Chroma collection id
    collection_ids: DashMap<String, String>,
}

impl ChromaVectorStore {
    /// Create a client for the configured server
    pub fn new(config: &VectorDbConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build Chroma client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            distance: config.distance.clone(),
            collection_ids: DashMap::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::vector_db(format!("Chroma {} failed ({}): {}", action, status, body)))
    }

    /// Resolve (creating on demand) the id of a collection
    async fn collection_id(&self, name: &str) -> Result<String> {
        if let Some(id) = self.collection_ids.get(name) {
            return Ok(id.clone());
        }

        let response = self
            .client
            .post(self.url("/collections"))
            .json(&json!({
                "name": name,
                "metadata": { "hnsw:space": self.distance },
                "get_or_create": true,
            }))
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("Chroma request failed: {}", e)))?;

        let collection: ChromaCollection = Self::check(response, "get_or_create")
            .await?
            .json()
            .await
            .map_err(|e| Error::vector_db(format!("Failed to parse Chroma collection: {}", e)))?;

        tracing::info!("Using Chroma collection '{}' ({})", name, collection.id);
        self.collection_ids.insert(name.to_string(), collection.id.clone());
        Ok(collection.id)
    }

    /// Record count of a collection by Chroma id
    async fn count_by_id(&self, id: &str) -> Result<usize> {
        let response = self
            .client
            .get(self.url(&format!("/collections/{}/count", id)))
            .send()
            .await?;
        let count: Value = Self::check(response, "count").await?.json().await?;
        Ok(count.as_u64().unwrap_or(0) as usize)
    }
}

#[derive(Deserialize)]
struct ChromaCollection {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: Vec<&'a [f32]>,
    metadatas: Vec<&'a Metadata>,
    documents: Vec<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

impl QueryResponse {
    /// Flatten the first (only) query's results
    fn into_matches(self) -> Vec<VectorMatch> {
        let ids = self.ids.into_iter().next().unwrap_or_default();
        let documents = self.documents.and_then(|d| d.into_iter().next()).unwrap_or_default();
        let metadatas = self.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default();
        let distances = self.distances.and_then(|d| d.into_iter().next()).unwrap_or_default();

        ids.into_iter()
            .enumerate()
            .map(|(i, id)| VectorMatch {
                id,
                document: documents.get(i).cloned().flatten().unwrap_or_default(),
                metadata: metadatas.get(i).cloned().flatten().unwrap_or_default(),
                similarity: 1.0 - distances.get(i).copied().unwrap_or(1.0),
            })
            .collect()
    }
}

#[async_trait]
impl VectorStoreProvider for ChromaVectorStore {
    async fn ensure_collection(&self, collection: &str) -> Result<()> {
        self.collection_id(collection).await.map(|_| ())
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let id = self.collection_id(collection).await?;

        let request = UpsertRequest {
            ids: records.iter().map(|r| r.id.as_str()).collect(),
            embeddings: records.iter().map(|r| r.embedding.as_slice()).collect(),
            metadatas: records.iter().map(|r| &r.metadata).collect(),
            documents: records.iter().map(|r| r.document.as_str()).collect(),
        };

        let response = self
            .client
            .post(self.url(&format!("/collections/{}/upsert", id)))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("Chroma upsert request failed: {}", e)))?;
        Self::check(response, "upsert").await?;

        tracing::debug!("Upserted {} vectors into '{}'", records.len(), collection);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>> {
        let id = self.collection_id(collection).await?;

        let response = self
            .client
            .post(self.url(&format!("/collections/{}/query", id)))
            .json(&json!({
                "query_embeddings": [embedding],
                "n_results": top_k,
                "include": ["documents", "metadatas", "distances"],
            }))
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("Chroma query request failed: {}", e)))?;

        let parsed: QueryResponse = Self::check(response, "query")
            .await?
            .json()
            .await
            .map_err(|e| Error::vector_db(format!("Failed to parse Chroma query: {}", e)))?;

        Ok(parsed.into_matches())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let id = self.collection_id(collection).await?;
        self.count_by_id(&id).await
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let response = self
            .client
            .get(self.url("/collections"))
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("Chroma request failed: {}", e)))?;

        let collections: Vec<ChromaCollection> = Self::check(response, "list_collections")
            .await?
            .json()
            .await
            .map_err(|e| Error::vector_db(format!("Failed to parse Chroma collections: {}", e)))?;

        let mut listed = Vec::with_capacity(collections.len());
        for collection in collections {
            let count = self.count_by_id(&collection.id).await?;
            self.collection_ids.insert(collection.name.clone(), collection.id);
            listed.push(CollectionInfo {
                name: collection.name,
                count,
            });
        }
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        let response = self
            .client
            .delete(self.url(&format!("/collections/{}", collection)))
            .send()
            .await?;
        self.collection_ids.remove(collection);
        Ok(response.status().is_success())
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self.client.get(self.url("/heartbeat")).send().await?;
        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "chroma"
    }
}
