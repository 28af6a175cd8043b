//! Records, chunks and enriched chunks with provenance metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Metadata attached to records and chunks
///
/// Loaders emit primitive values only; nested values can still arrive through
/// pre-loaded row sets and are flattened by the sanitizer before storage.
pub type Metadata = BTreeMap<String, Value>;

/// Text produced by a loader together with its source metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Extracted text
    pub text: String,
    /// Source-specific metadata (path, page, row, dataset, ...)
    #[serde(default)]
    pub metadata: Metadata,
}

impl RawRecord {
    /// Create a record with empty metadata
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Provenance string stamped by the loader, if any
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

/// A piece of split text carrying the metadata of its parent record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub text: String,
    /// Inherited metadata
    pub metadata: Metadata,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// A validated chunk with a stable identity, ready for embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedChunk {
    /// Globally unique id, generated per enrichment
    pub chunk_id: Uuid,
    /// Groups the chunks of one ingestion unit
    pub document_id: String,
    /// Chunk text
    pub text: String,
    /// Provenance (file path or `dataset://name`)
    pub source: String,
    /// Filename as supplied by the caller
    pub original_filename: String,
    /// 0-based position within the document
    pub chunk_index: usize,
    /// Number of chunks produced for the document in this run
    pub total_chunks: usize,
    /// Length of `text` in characters
    pub chunk_size: usize,
    /// Creation instant
    pub timestamp: DateTime<Utc>,
    /// Inherited metadata, already sanitized
    pub metadata: Metadata,
}

impl EnrichedChunk {
    /// Page number inherited from a paginated source
    pub fn page_number(&self) -> Option<u64> {
        self.metadata.get("page_number").and_then(Value::as_u64)
    }

    /// Flat primitive-only metadata map handed to the vector store
    ///
    /// Inherited entries come first; the identity fields always win.
    pub fn vector_metadata(&self) -> Metadata {
        let mut map = self.metadata.clone();
        map.insert("source".into(), Value::from(self.source.as_str()));
        map.insert("document_id".into(), Value::from(self.document_id.as_str()));
        map.insert("chunk_id".into(), Value::from(self.chunk_id.to_string()));
        map.insert(
            "original_filename".into(),
            Value::from(self.original_filename.as_str()),
        );
        map.insert("chunk_index".into(), Value::from(self.chunk_index));
        map.insert("total_chunks".into(), Value::from(self.total_chunks));
        map.insert("chunk_size".into(), Value::from(self.chunk_size));
        map.insert("timestamp".into(), Value::from(self.timestamp.to_rfc3339()));
        crate::ingestion::metadata::sanitize_metadata(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_builder() {
        let record = RawRecord::new("hello")
            .with_meta("source", "a.txt")
            .with_meta("row", 3);
        assert_eq!(record.source(), Some("a.txt"));
        assert_eq!(record.metadata["row"], json!(3));
    }

    #[test]
    fn test_vector_metadata_identity_wins() {
        let mut metadata = Metadata::new();
        metadata.insert("chunk_index".into(), json!(99));
        metadata.insert("page_number".into(), json!(2));
        metadata.insert("tags".into(), json!(["a", "b"]));

        let chunk = EnrichedChunk {
            chunk_id: Uuid::new_v4(),
            document_id: "doc-1".into(),
            text: "some text".into(),
            source: "report.pdf".into(),
            original_filename: "report.pdf".into(),
            chunk_index: 4,
            total_chunks: 9,
            chunk_size: 9,
            timestamp: Utc::now(),
            metadata,
        };

        let flat = chunk.vector_metadata();
        assert_eq!(flat["chunk_index"], json!(4));
        assert_eq!(flat["page_number"], json!(2));
        assert_eq!(flat["tags"], json!("[\"a\",\"b\"]"));
        assert_eq!(chunk.page_number(), Some(2));
    }
}
