//! Property tests for the pure pipeline stages

use proptest::prelude::*;
use serde_json::Value;

use rag_ingest::ingestion::{
    clean, enrich, is_valid_chunk, sanitize_metadata, split, split_spans, ChunkingConfig,
};
use rag_ingest::types::{Chunk, Metadata};

fn primitive_or_nested() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,12}".prop_map(Value::from),
    ];
    leaf.prop_recursive(2, 12, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Word-based text with the separators the splitter knows about
fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(
        ("[a-z]{1,12}", prop_oneof![Just(" "), Just(" "), Just(". "), Just("\n"), Just("\n\n")]),
        1..200,
    )
    .prop_map(|parts| parts.into_iter().map(|(w, sep)| w + sep).collect())
}

proptest! {
    #[test]
    fn cleaning_is_idempotent(text in "[a-zA-Z0-9 \t\n.!]{0,300}") {
        let once = clean(&text);
        prop_assert_eq!(clean(&once), once);
    }

    #[test]
    fn sanitized_metadata_is_primitive_and_stable(
        map in prop::collection::btree_map("[a-z_]{1,8}", primitive_or_nested(), 0..8)
    ) {
        let metadata: Metadata = map;
        let once = sanitize_metadata(&metadata);
        prop_assert!(once.values().all(|v| v.is_string() || v.is_number() || v.is_boolean()));
        prop_assert_eq!(sanitize_metadata(&once), once);
    }

    #[test]
    fn lowering_min_length_never_rejects_more(
        text in "[a-zA-Z0-9 \n]{0,300}",
        a in 0usize..200,
        b in 0usize..200,
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        if is_valid_chunk(&text, high) {
            prop_assert!(is_valid_chunk(&text, low));
        }
    }

    #[test]
    fn chunks_respect_size_and_carry_overlap(
        raw in document(),
        size in 20usize..400,
        overlap_pct in 0usize..95,
    ) {
        let text = clean(&raw);
        let overlap = size * overlap_pct / 100;
        let config = ChunkingConfig::new(size, overlap);
        let chunks = split(&text, &config).unwrap();

        for chunk in &chunks {
            prop_assert!(chunk.chars().count() <= size);
        }
        for pair in chunks.windows(2) {
            let chars: Vec<char> = pair[0].chars().collect();
            let tail: String = chars[chars.len().saturating_sub(overlap)..].iter().collect();
            prop_assert!(pair[1].starts_with(tail.trim_start()));
        }
    }

    #[test]
    fn chunks_cover_every_visible_character(
        raw in document(),
        size in 20usize..400,
        overlap_pct in 0usize..95,
    ) {
        let text = clean(&raw);
        let chars: Vec<char> = text.chars().collect();
        let config = ChunkingConfig::new(size, size * overlap_pct / 100);
        let spans = split_spans(&text, &config).unwrap();

        let mut covered = vec![false; chars.len()];
        for span in &spans {
            covered[span.start..span.end].iter_mut().for_each(|c| *c = true);
        }
        for (i, c) in chars.iter().enumerate() {
            prop_assert!(c.is_whitespace() || covered[i], "character {} not covered", i);
        }
    }

    #[test]
    fn chunk_indices_are_contiguous(n in 1usize..60) {
        let chunks: Vec<Chunk> = (0..n)
            .map(|i| Chunk::new(format!("chunk {}", i), Metadata::new()))
            .collect();
        let enriched = enrich(&chunks, "doc", "file.txt", "/tmp/file.txt");

        let mut indices: Vec<usize> = enriched.iter().map(|c| c.chunk_index).collect();
        indices.sort_unstable();
        prop_assert_eq!(indices, (0..n).collect::<Vec<_>>());
        prop_assert!(enriched.iter().all(|c| c.total_chunks == n));
    }
}
