//! Chat session endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::session::{ChatMessage, ChatSession, Role, SessionSummary};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMessageRequest {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.sessions().list())
}

/// POST /api/sessions - Create (or fetch) a session
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Json<ChatSession> {
    let collection = request
        .collection_name
        .unwrap_or_else(|| state.query().default_collection().to_string());
    Json(state.sessions().create(&collection, request.session_id))
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatSession>> {
    state
        .sessions()
        .get(&id)
        .map(Json)
        .ok_or(Error::SessionNotFound(id))
}

/// POST /api/sessions/:id/messages
pub async fn add_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AddMessageRequest>,
) -> Result<Json<ChatMessage>> {
    let message = state
        .sessions()
        .add_message(&id, request.role, request.content, request.sources)?;
    Ok(Json(message))
}

/// GET /api/sessions/:id/history
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let sessions = state.sessions();
    let history = sessions.formatted_history(&id, state.config().sessions.history_window)?;
    let pairs = sessions.chat_pairs(&id)?;
    Ok(Json(serde_json::json!({ "history": history, "pairs": pairs })))
}

/// DELETE /api/sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if state.sessions().delete(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::SessionNotFound(id))
    }
}
