//! Ingestion outcome types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::document::EnrichedChunk;

/// Lifecycle of one ingestion unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStage {
    Pending,
    Loading,
    Cleaning,
    Splitting,
    Validating,
    Enriching,
    Storing,
    Completed,
    Failed,
}

impl fmt::Display for IngestionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Cleaning => "cleaning",
            Self::Splitting => "splitting",
            Self::Validating => "validating",
            Self::Enriching => "enriching",
            Self::Storing => "storing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Aggregate statistics over an enriched chunk batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub total_chunks: usize,
    /// Rounded mean chunk length
    pub avg_chunk_size: usize,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub total_characters: usize,
    pub processing_time_ms: u64,
}

impl ProcessingStats {
    /// Compute statistics for a batch
    pub fn from_chunks(chunks: &[EnrichedChunk], elapsed: Duration) -> Self {
        let processing_time_ms = elapsed.as_millis() as u64;
        if chunks.is_empty() {
            return Self {
                processing_time_ms,
                ..Self::default()
            };
        }

        let sizes = chunks.iter().map(|c| c.chunk_size);
        let total_characters: usize = sizes.clone().sum();
        let avg = (total_characters as f64 / chunks.len() as f64).round() as usize;

        Self {
            total_chunks: chunks.len(),
            avg_chunk_size: avg,
            min_chunk_size: sizes.clone().min().unwrap_or(0),
            max_chunk_size: sizes.max().unwrap_or(0),
            total_characters,
            processing_time_ms,
        }
    }
}

/// A chunk that the embedding+storage collaborator could not store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFailure {
    /// Position in the submitted batch
    pub index: usize,
    /// Why it failed
    pub reason: String,
}

/// Outcome of a storage call that did not fail outright
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertReport {
    /// Number of chunks submitted
    pub requested: usize,
    /// Ids of the chunks actually stored
    pub stored_ids: Vec<String>,
    /// Chunks that failed, with reasons
    pub failures: Vec<ChunkFailure>,
}

impl UpsertReport {
    /// Positions that failed
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }

    /// Some, but not all, chunks failed
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() && !self.stored_ids.is_empty()
    }

    /// Chunks were submitted and none was stored
    pub fn is_total_failure(&self) -> bool {
        self.requested > 0 && self.stored_ids.is_empty()
    }
}

/// The orchestrator's return contract
///
/// `success == false` always comes with an empty chunk list, zero counts and a
/// populated `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub success: bool,
    pub document_id: String,
    pub chunks_created: usize,
    pub chunks: Vec<EnrichedChunk>,
    pub stats: ProcessingStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_ids: Option<Vec<String>>,
    /// Chunks the storage collaborator failed to embed or store
    pub failed_count: usize,
    /// Chunks dropped by quality validation
    pub filtered_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<ChunkFailure>,
    pub stage: IngestionStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<IngestionStage>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingResult {
    /// Build a failed result for a unit that aborted at `stage`
    pub fn failed(
        document_id: impl Into<String>,
        stage: IngestionStage,
        error: impl fmt::Display,
        elapsed: Duration,
    ) -> Self {
        let error = error.to_string();
        Self {
            success: false,
            document_id: document_id.into(),
            chunks_created: 0,
            chunks: Vec::new(),
            stats: ProcessingStats::from_chunks(&[], elapsed),
            vector_ids: None,
            failed_count: 0,
            filtered_count: 0,
            failures: Vec::new(),
            stage: IngestionStage::Failed,
            failed_stage: Some(stage),
            message: format!("Processing failed during {}", stage),
            error: Some(error),
        }
    }
}
