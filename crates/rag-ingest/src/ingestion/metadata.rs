//! Chunk identity assignment and metadata sanitization

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::types::{Chunk, EnrichedChunk, Metadata};

/// Keys owned by the enricher; inherited values under these names are dropped
const IDENTITY_KEYS: &[&str] = &[
    "source",
    "document_id",
    "chunk_id",
    "original_filename",
    "chunk_index",
    "total_chunks",
    "chunk_size",
    "timestamp",
];

/// Attach identity and provenance to every chunk of one document
///
/// `chunk_index` follows input order and `total_chunks` is the input length.
/// Every call mints fresh chunk ids. A `source` stamped by the loader wins over
/// `source_path`, which is only the fallback.
pub fn enrich(
    chunks: &[Chunk],
    document_id: &str,
    original_filename: &str,
    source_path: &str,
) -> Vec<EnrichedChunk> {
    let total_chunks = chunks.len();
    let timestamp = Utc::now();

    chunks
        .iter()
        .enumerate()
        .map(|(chunk_index, chunk)| {
            let source = chunk
                .metadata
                .get("source")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(source_path)
                .to_string();

            let mut metadata = sanitize_metadata(&chunk.metadata);
            for key in IDENTITY_KEYS {
                metadata.remove(*key);
            }

            EnrichedChunk {
                chunk_id: Uuid::new_v4(),
                document_id: document_id.to_string(),
                text: chunk.text.clone(),
                source,
                original_filename: original_filename.to_string(),
                chunk_index,
                total_chunks,
                chunk_size: chunk.text.chars().count(),
                timestamp,
                metadata,
            }
        })
        .collect()
}

/// Restrict metadata to strings, numbers and booleans
///
/// Nulls are dropped, primitives pass through and arrays or objects are
/// serialized to JSON strings. Applying it twice changes nothing.
pub fn sanitize_metadata(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::Bool(_) | Value::Number(_) | Value::String(_) => value.clone(),
                Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
            };
            Some((key.clone(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn chunk(text: &str, metadata: Value) -> Chunk {
        let metadata = match metadata {
            Value::Object(map) => map.into_iter().collect(),
            _ => Metadata::new(),
        };
        Chunk::new(text, metadata)
    }

    #[test]
    fn test_indices_and_totals() {
        let chunks = vec![
            chunk("one", json!({})),
            chunk("two", json!({})),
            chunk("three", json!({})),
        ];
        let enriched = enrich(&chunks, "doc-1", "notes.txt", "/tmp/notes.txt");

        assert_eq!(enriched.len(), 3);
        for (i, c) in enriched.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.total_chunks, 3);
            assert_eq!(c.document_id, "doc-1");
            assert_eq!(c.source, "/tmp/notes.txt");
            assert_eq!(c.original_filename, "notes.txt");
        }
        assert_eq!(enriched[2].chunk_size, 5);
    }

    #[test]
    fn test_fresh_ids_for_duplicate_text() {
        let chunks = vec![chunk("same", json!({})), chunk("same", json!({}))];
        let first = enrich(&chunks, "d", "f", "s");
        let second = enrich(&chunks, "d", "f", "s");
        let ids: HashSet<Uuid> = first.iter().chain(&second).map(|c| c.chunk_id).collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_loader_source_wins() {
        let chunks = vec![chunk("row", json!({"source": "dataset://imdb", "row_index": 4}))];
        let enriched = enrich(&chunks, "d", "imdb", "fallback");
        assert_eq!(enriched[0].source, "dataset://imdb");
        assert!(!enriched[0].metadata.contains_key("source"));
        assert_eq!(enriched[0].metadata["row_index"], json!(4));
    }

    #[test]
    fn test_enrich_leaves_input_untouched() {
        let chunks = vec![chunk("text", json!({"nested": {"a": 1}}))];
        let before = chunks.clone();
        let _ = enrich(&chunks, "d", "f", "s");
        assert_eq!(chunks, before);
    }

    #[test]
    fn test_sanitize_rules() {
        let input = chunk(
            "",
            json!({
                "keep": "yes",
                "count": 3,
                "flag": false,
                "gone": null,
                "list": [1, 2],
                "obj": {"k": "v"}
            }),
        )
        .metadata;

        let out = sanitize_metadata(&input);
        assert_eq!(out.len(), 5);
        assert_eq!(out["keep"], json!("yes"));
        assert_eq!(out["count"], json!(3));
        assert_eq!(out["flag"], json!(false));
        assert_eq!(out["list"], json!("[1,2]"));
        assert_eq!(out["obj"], json!("{\"k\":\"v\"}"));
        assert_eq!(sanitize_metadata(&out), out);
    }
}
