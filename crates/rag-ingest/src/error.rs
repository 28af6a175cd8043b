//! Error types for the ingestion pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised while turning a source into raw records
#[derive(Debug, Error)]
pub enum LoadError {
    /// Source could not be read or parsed
    #[error("Failed to load '{origin}': {message}")]
    Unreadable { origin: String, message: String },

    /// Type tag does not map to any supported source kind
    #[error("Unsupported source type: {0}")]
    UnsupportedType(String),

    /// Declared content field is absent from the source
    #[error(
        "Content field '{field}' not found in '{origin}'. Available fields: {}",
        .available.join(", ")
    )]
    MissingContentField {
        origin: String,
        field: String,
        available: Vec<String>,
    },

    /// Source produced no usable text
    #[error("No text content could be extracted from '{origin}'")]
    Empty { origin: String },

    /// Every access variant for a remote dataset failed
    #[error(
        "Failed to load dataset '{dataset}' (split '{split}', column '{column}'): {message}. \
         Check that the dataset is public, the split exists and the column name is correct"
    )]
    Remote {
        dataset: String,
        split: String,
        column: String,
        message: String,
    },
}

impl LoadError {
    /// Create an unreadable-source error
    pub fn unreadable(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreadable {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Create an empty-source error
    pub fn empty(origin: impl Into<String>) -> Self {
        Self::Empty {
            origin: origin.into(),
        }
    }
}

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Loader failure
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Splitter misconfiguration or failure
    #[error("Chunk splitting failed: {0}")]
    Split(String),

    /// Every chunk of a batch was rejected
    #[error(
        "All {rejected} chunks were rejected by quality validation; \
         content may be too repetitive, too short or malformed"
    )]
    ValidationExhausted { rejected: usize },

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector database error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// LLM generation error
    #[error("LLM generation failed: {0}")]
    Llm(String),

    /// Chat session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a splitter error
    pub fn split(message: impl Into<String>) -> Self {
        Self::Split(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::BAD_REQUEST, "config_error"),
            Error::Load(LoadError::UnsupportedType(_)) => {
                (StatusCode::BAD_REQUEST, "unsupported_type")
            }
            Error::Load(LoadError::Remote { .. }) => (StatusCode::BAD_GATEWAY, "load_error"),
            Error::Load(_) => (StatusCode::BAD_REQUEST, "load_error"),
            Error::Split(_) => (StatusCode::UNPROCESSABLE_ENTITY, "split_error"),
            Error::ValidationExhausted { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error")
            }
            Error::Embedding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error"),
            Error::VectorDb(_) => (StatusCode::INTERNAL_SERVER_ERROR, "vector_db_error"),
            Error::Llm(_) => (StatusCode::BAD_GATEWAY, "llm_error"),
            Error::SessionNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_lists_available_columns() {
        let err = LoadError::MissingContentField {
            origin: "dataset://imdb".to_string(),
            field: "review".to_string(),
            available: vec!["text".to_string(), "label".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'review'"));
        assert!(msg.contains("text, label"));
    }

    #[test]
    fn test_load_error_is_transparent() {
        let err: Error = LoadError::empty("notes.txt").into();
        assert_eq!(
            err.to_string(),
            "No text content could be extracted from 'notes.txt'"
        );
    }

    #[test]
    fn test_status_mapping() {
        let response = Error::SessionNotFound("abc".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = Error::from(LoadError::UnsupportedType("image/png".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = Error::llm("quota exceeded").into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
