//! Question answering, retrieval and collection endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::Result;
use crate::generation::{Answer, PromptBuilder};
use crate::providers::CollectionInfo;
use crate::retrieval::ScoredChunk;
use crate::server::state::AppState;

/// Query request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub question: String,
    /// Chunks to retrieve; defaults to `llm.retrieval_k`
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub collection_name: Option<String>,
    /// Answer within this chat session and record both turns
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Generated answer
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(flatten)]
    pub answer: Answer,
    pub processing_time_ms: u64,
}

/// POST /api/query - Answer a question from the stored chunks
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();
    tracing::info!("Query: \"{}\"", request.question);

    let top_k = request.top_k.unwrap_or(state.config().llm.retrieval_k);
    let collection = request.collection_name.as_deref();
    let answer = match &request.session_id {
        Some(id) => {
            state
                .chain()
                .ask_in_session(id, &request.question, top_k, collection)
                .await?
        }
        None => state.chain().ask(&request.question, top_k, collection).await?,
    };

    Ok(Json(QueryResponse {
        answer,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// Search request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub question: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub collection_name: Option<String>,
}

fn default_top_k() -> usize {
    5
}

/// Ranked chunks for a question
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<ScoredChunk>,
    /// Distinct sources among the results, in rank order
    pub sources: Vec<String>,
    pub processing_time_ms: u64,
}

/// POST /api/search - Retrieve the chunks most similar to a question
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();

    let results = state
        .query()
        .query(
            &request.question,
            request.top_k,
            request.collection_name.as_deref(),
        )
        .await?;
    let sources = PromptBuilder::source_names(&results);

    Ok(Json(SearchResponse {
        results,
        sources,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// GET /api/collections - Every collection with its chunk count
pub async fn list_collections(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>> {
    let collections: Vec<CollectionInfo> = state.query().list_collections().await?;
    Ok(Json(serde_json::json!({
        "collections": collections,
        "default": state.query().default_collection(),
    })))
}

/// GET /api/collections/:name - Number of stored chunks
pub async fn collection_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let count = state.query().count(Some(&name)).await?;
    Ok(Json(serde_json::json!({ "name": name, "count": count })))
}

/// DELETE /api/collections/:name - Drop a collection
pub async fn delete_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let deleted = state.query().delete_collection(&name).await?;
    tracing::info!("Delete collection '{}': {}", name, deleted);
    Ok(Json(serde_json::json!({ "name": name, "deleted": deleted })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::error::Error;
    use crate::providers::{
        EmbeddingProvider, InMemoryVectorStore, LlmProvider, VectorRecord, VectorStoreProvider,
    };
    use crate::session::Role;
    use crate::types::Metadata;
    use async_trait::async_trait;
    use axum::{http::StatusCode, response::IntoResponse};
    use std::sync::Arc;

    struct FlatEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FlatEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "flat"
        }
    }

    struct CannedLlm;

    #[async_trait]
    impl LlmProvider for CannedLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok("Invoices are due in 30 days.".to_string())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned-1"
        }
    }

    async fn state() -> AppState {
        let config = RagConfig::default();
        let vectors = Arc::new(InMemoryVectorStore::new());
        let record = VectorRecord {
            id: "terms".to_string(),
            embedding: vec![1.0, 0.0],
            document: "Payment terms are net 30.".to_string(),
            metadata: Metadata::new(),
        };
        vectors
            .upsert(&config.vector_db.default_collection, &[record])
            .await
            .unwrap();
        AppState::from_parts(config, Arc::new(FlatEmbedder), vectors, Arc::new(CannedLlm)).unwrap()
    }

    fn ask(question: &str, session_id: Option<&str>) -> Json<QueryRequest> {
        Json(QueryRequest {
            question: question.to_string(),
            top_k: None,
            collection_name: None,
            session_id: session_id.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_query_answers_and_records_session_turns() {
        let state = state().await;
        state.sessions().create("rag_documents", Some("s".into()));

        let Json(response) = query(State(state.clone()), ask("When are invoices due?", Some("s")))
            .await
            .unwrap();
        assert_eq!(response.answer.answer, "Invoices are due in 30 days.");
        assert_eq!(response.answer.sources[0].id, "terms");

        let messages = state.sessions().get("s").unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Invoices are due in 30 days.");

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["sessionId"], "s");
        assert!(body["processingTimeMs"].is_u64());
    }

    #[tokio::test]
    async fn test_query_with_unknown_session_is_not_found() {
        let state = state().await;
        let err = query(State(state.clone()), ask("When are invoices due?", Some("nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
        assert!(state.sessions().list().is_empty());
    }

    #[tokio::test]
    async fn test_collections_listed_with_counts() {
        let state = state().await;
        let Json(body) = list_collections(State(state)).await.unwrap();
        assert_eq!(body["collections"][0]["name"], "rag_documents");
        assert_eq!(body["collections"][0]["count"], 1);
        assert_eq!(body["default"], "rag_documents");
    }
}
