//! API routes for the ingestion server

pub mod ingest;
pub mod query;
pub mod sessions;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Ingestion - multipart body limit leaves room for form overhead
        .route(
            "/ingest",
            post(ingest::ingest_file).layer(DefaultBodyLimit::max(max_upload_size + 64 * 1024)),
        )
        .route("/ingest/dataset", post(ingest::ingest_dataset))
        .route("/ingest/dataset/preview", post(ingest::preview_dataset))
        // Answering and retrieval
        .route("/query", post(query::query))
        .route("/search", post(query::search))
        .route("/collections", get(query::list_collections))
        .route(
            "/collections/:name",
            get(query::collection_stats).delete(query::delete_collection),
        )
        // Sessions
        .route(
            "/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route(
            "/sessions/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/sessions/:id/messages", post(sessions::add_message))
        .route("/sessions/:id/history", get(sessions::get_history))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "rag-ingest",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document ingestion and chunk-quality pipeline",
        "endpoints": {
            "POST /api/ingest": "Upload and process a PDF, DOCX, TXT or CSV file",
            "POST /api/ingest/dataset": "Load and process rows from a remote dataset",
            "POST /api/ingest/dataset/preview": "Preview dataset columns and sample rows",
            "POST /api/query": "Answer a question from stored chunks, optionally within a chat session",
            "POST /api/search": "Retrieve the chunks most similar to a question",
            "GET /api/collections": "List collections with chunk counts",
            "GET /api/collections/:name": "Count stored chunks",
            "DELETE /api/collections/:name": "Drop a collection",
            "GET /api/sessions": "List chat sessions",
            "POST /api/sessions": "Create a chat session",
            "GET /api/sessions/:id": "Get a chat session",
            "DELETE /api/sessions/:id": "Delete a chat session",
            "POST /api/sessions/:id/messages": "Append a message",
            "GET /api/sessions/:id/history": "Formatted history and question/answer pairs"
        }
    }))
}
