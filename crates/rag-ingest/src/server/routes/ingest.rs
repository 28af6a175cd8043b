//! Ingestion endpoints: file upload and remote datasets

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::{Error, LoadError, Result};
use crate::ingestion::IngestOptions;
use crate::loaders::{DatasetPreview, DatasetRequest, DatasetValidation, Source};
use crate::server::state::AppState;
use crate::types::{IngestionStage, ProcessingResult, ProcessingStats};

/// Extensions accepted by the upload endpoint
const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt", "csv"];

/// Summary of one ingestion unit
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    pub document_id: String,
    pub filename: String,
    pub chunks_created: usize,
    pub vectors_stored: usize,
    pub failed_count: usize,
    pub filtered_count: usize,
    pub stats: ProcessingStats,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<IngestionStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestResponse {
    fn from_result(filename: String, result: ProcessingResult) -> (StatusCode, Json<Self>) {
        let status = match result.failed_stage {
            None => StatusCode::OK,
            Some(IngestionStage::Loading) => StatusCode::BAD_REQUEST,
            Some(IngestionStage::Storing) => StatusCode::BAD_GATEWAY,
            Some(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let response = Self {
            success: result.success,
            document_id: result.document_id,
            filename,
            chunks_created: result.chunks_created,
            vectors_stored: result.vector_ids.map_or(0, |ids| ids.len()),
            failed_count: result.failed_count,
            filtered_count: result.filtered_count,
            stats: result.stats,
            message: result.message,
            failed_stage: result.failed_stage,
            error: result.error,
        };
        (status, Json(response))
    }
}

/// POST /api/ingest - Upload and process one file
///
/// Multipart fields: `file`, optional `collectionName`, and for CSV files
/// `csvColumn` and `csvCombinedColumns`.
pub async fn ingest_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut collection = None;
    let mut csv_column = None;
    let mut csv_combined = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Internal(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "upload".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::Internal(format!("Failed to read file: {}", e)))?;
                upload = Some((filename, data.to_vec()));
            }
            "collectionName" | "csvColumn" | "csvCombinedColumns" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::Internal(format!("Failed to read {}: {}", name, e)))?;
                let value = value.trim().to_string();
                match name.as_str() {
                    "collectionName" if !value.is_empty() => collection = Some(value),
                    "csvColumn" if !value.is_empty() => csv_column = Some(value),
                    "csvCombinedColumns" => csv_combined = value == "true",
                    _ => {}
                }
            }
            _ => tracing::debug!("Ignoring multipart field '{}'", name),
        }
    }

    let (filename, data) = upload.ok_or_else(|| Error::Config("No file provided".to_string()))?;
    check_upload(&filename, data.len(), state.config().server.max_upload_size)?;

    let stored_name = format!("{}_{}", Uuid::new_v4(), sanitize_filename(&filename));
    let path = state.config().server.upload_dir.join(stored_name);
    tokio::fs::write(&path, &data).await?;

    tracing::info!(
        "File uploaded: {} ({} bytes, collection: {})",
        filename,
        data.len(),
        collection.as_deref().unwrap_or("default")
    );

    let mut source = Source::from_path(&path)?;
    if let Source::Csv { options, .. } = &mut source {
        options.tabular.content_field = csv_column;
        options.tabular.combine_columns = csv_combined;
    }

    let result = state
        .pipeline()
        .ingest(
            state.loader(),
            &source,
            IngestOptions {
                original_filename: Some(filename.clone()),
                collection,
                ..IngestOptions::default()
            },
        )
        .await;

    Ok(IngestResponse::from_result(filename, result))
}

/// Body of a dataset ingestion request
#[derive(Debug, Deserialize)]
pub struct DatasetIngestRequest {
    #[serde(flatten)]
    pub dataset: DatasetRequest,
    #[serde(default, rename = "collectionName", alias = "collection_name")]
    pub collection: Option<String>,
}

/// POST /api/ingest/dataset - Load rows from a remote dataset and process them
pub async fn ingest_dataset(
    State(state): State<AppState>,
    Json(request): Json<DatasetIngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    if request.dataset.dataset.trim().is_empty() {
        return Err(Error::Config("Dataset name is required".to_string()));
    }

    tracing::info!(
        "Dataset ingestion: {} (split: {}, collection: {})",
        request.dataset.dataset,
        request.dataset.split.as_deref().unwrap_or("default"),
        request.collection.as_deref().unwrap_or("default")
    );

    let name = request.dataset.dataset.clone();
    let source = Source::Dataset(request.dataset);
    let result = state
        .pipeline()
        .ingest(
            state.loader(),
            &source,
            IngestOptions {
                collection: request.collection,
                ..IngestOptions::default()
            },
        )
        .await;

    Ok(IngestResponse::from_result(name, result))
}

/// Body of a dataset preview request
#[derive(Debug, Deserialize)]
pub struct DatasetPreviewRequest {
    #[serde(flatten)]
    pub dataset: DatasetRequest,
    #[serde(default = "default_preview_rows", rename = "sampleSize", alias = "sample_size")]
    pub sample_size: usize,
}

fn default_preview_rows() -> usize {
    5
}

/// Preview plus a check of the declared columns
#[derive(Debug, Serialize)]
pub struct DatasetPreviewResponse {
    pub preview: DatasetPreview,
    pub validation: DatasetValidation,
}

/// POST /api/ingest/dataset/preview - Show columns and sample rows
pub async fn preview_dataset(
    State(state): State<AppState>,
    Json(request): Json<DatasetPreviewRequest>,
) -> Result<Json<DatasetPreviewResponse>> {
    let datasets = state.loader().datasets();
    let preview = datasets
        .preview(&request.dataset, request.sample_size)
        .await?;
    let validation = datasets.validate(&request.dataset).await;
    Ok(Json(DatasetPreviewResponse {
        preview,
        validation,
    }))
}

/// Reject empty, oversized or unsupported uploads
fn check_upload(filename: &str, size: usize, max_size: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::Config(format!("File '{}' is empty", filename)));
    }
    if size > max_size {
        return Err(Error::Config(format!(
            "File size exceeds {}MB limit",
            max_size / 1024 / 1024
        )));
    }

    let extension = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(LoadError::UnsupportedType(format!(
            "'{}' (only PDF, DOCX, TXT and CSV are allowed)",
            filename
        ))
        .into());
    }
    Ok(())
}

/// Make a client filename safe to store: `[a-z0-9._-]` with single underscores
pub fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let (stem, extension) = match base.rfind('.') {
        Some(dot) if dot > 0 => (&base[..dot], base[dot + 1..].to_ascii_lowercase()),
        _ => (base.as_str(), String::new()),
    };
    let extension: String = extension.chars().filter(char::is_ascii_alphanumeric).collect();

    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c.to_ascii_lowercase()
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let stem = out.trim_matches('_');
    let stem = if stem.is_empty() { "file" } else { stem };
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}
