//! Ingestion pipeline orchestration

use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::{ChunkingPolicy, RagConfig};
use crate::error::{Error, Result};
use crate::loaders::{Source, SourceLoader};
use crate::providers::ChunkStore;
use crate::types::{
    Chunk, EnrichedChunk, IngestionStage, ProcessingResult, ProcessingStats, RawRecord,
    UpsertReport,
};

use super::cleaner::clean;
use super::metadata::enrich;
use super::splitter::{split, SourceType};
use super::validator::validate_chunk;

/// One ingestion unit: the records of a single document plus how to store them
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Records produced by a loader
    pub records: Vec<RawRecord>,
    /// Groups every chunk of this unit
    pub document_id: String,
    /// Original filename or dataset name
    pub source_name: String,
    /// Provenance used when a record carries no `source` of its own
    pub source_path: String,
    /// Selects the chunking policy
    pub source_type: SourceType,
    /// Hand enriched chunks to the chunk store
    pub store_in_vector_store: bool,
    /// When the unit started (processing time is measured from here)
    pub started_at: Instant,
    /// Target collection; the store's default when `None`
    pub collection: Option<String>,
}

impl IngestRequest {
    /// Create a request with a fresh document id that stores into the default collection
    pub fn new(records: Vec<RawRecord>, source_name: impl Into<String>, source_type: SourceType) -> Self {
        let source_name = source_name.into();
        Self {
            records,
            document_id: Uuid::new_v4().to_string(),
            source_path: source_name.clone(),
            source_name,
            source_type,
            store_in_vector_store: true,
            started_at: Instant::now(),
            collection: None,
        }
    }

    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = document_id.into();
        self
    }

    pub fn with_source_path(mut self, source_path: impl Into<String>) -> Self {
        self.source_path = source_path.into();
        self
    }

    pub fn with_collection(mut self, collection: Option<String>) -> Self {
        self.collection = collection;
        self
    }

    pub fn with_started_at(mut self, started_at: Instant) -> Self {
        self.started_at = started_at;
        self
    }

    /// Run every stage except storage
    pub fn without_storage(mut self) -> Self {
        self.store_in_vector_store = false;
        self
    }
}

/// Caller options for [`IngestPipeline::ingest`]
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Document id; generated when `None`
    pub document_id: Option<String>,
    /// Original filename; the source's display name when `None`
    pub original_filename: Option<String>,
    /// Target collection
    pub collection: Option<String>,
    /// Skip the chunk store
    pub skip_storage: bool,
}

/// Main ingestion pipeline
///
/// Holds no mutable state; independent units may run concurrently against
/// one pipeline.
pub struct IngestPipeline {
    chunking: ChunkingPolicy,
    min_chunk_length: usize,
    store: Arc<dyn ChunkStore>,
}

impl IngestPipeline {
    /// Create a pipeline from configuration
    pub fn new(config: &RagConfig, store: Arc<dyn ChunkStore>) -> Self {
        Self::with_policy(
            config.chunking.clone(),
            config.validation.min_chunk_length,
            store,
        )
    }

    /// Create a pipeline with an explicit policy and validation floor
    pub fn with_policy(
        chunking: ChunkingPolicy,
        min_chunk_length: usize,
        store: Arc<dyn ChunkStore>,
    ) -> Self {
        Self {
            chunking,
            min_chunk_length,
            store,
        }
    }

    /// Chunking policy in use
    pub fn chunking(&self) -> &ChunkingPolicy {
        &self.chunking
    }

    /// Load a source, then process its records as one unit
    pub async fn ingest(
        &self,
        loader: &SourceLoader,
        source: &Source,
        options: IngestOptions,
    ) -> ProcessingResult {
        let started_at = Instant::now();
        let document_id = options
            .document_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        tracing::info!("[{}] Stage: {}", document_id, IngestionStage::Loading);
        let loaded = match loader.load(source).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!("[{}] Loading failed: {}", document_id, e);
                return ProcessingResult::failed(
                    document_id,
                    IngestionStage::Loading,
                    e,
                    started_at.elapsed(),
                );
            }
        };

        if loaded.skipped > 0 {
            tracing::warn!(
                "[{}] Skipped {} empty records from {}",
                document_id,
                loaded.skipped,
                source.origin()
            );
        }

        let mut request = IngestRequest::new(
            loaded.records,
            options.original_filename.unwrap_or_else(|| source.display_name()),
            source.source_type(),
        )
        .with_document_id(document_id)
        .with_source_path(source.origin())
        .with_collection(options.collection)
        .with_started_at(started_at);
        if options.skip_storage {
            request = request.without_storage();
        }

        self.process(request).await
    }

    /// Process several independent units concurrently
    pub async fn process_all(&self, requests: Vec<IngestRequest>) -> Vec<ProcessingResult> {
        join_all(requests.into_iter().map(|r| self.process(r))).await
    }

    /// Clean, split, validate, enrich and (optionally) store one unit
    ///
    /// Never returns an error: every failure becomes a result with
    /// `success == false`.
    pub async fn process(&self, request: IngestRequest) -> ProcessingResult {
        let mut stage = IngestionStage::Pending;
        match self.run(&request, &mut stage).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    "[{}] Processing failed during {}: {}",
                    request.document_id,
                    stage,
                    e
                );
                ProcessingResult::failed(
                    request.document_id.clone(),
                    stage,
                    e,
                    request.started_at.elapsed(),
                )
            }
        }
    }

    async fn run(
        &self,
        request: &IngestRequest,
        stage: &mut IngestionStage,
    ) -> Result<ProcessingResult> {
        let doc = request.document_id.as_str();

        *stage = IngestionStage::Cleaning;
        tracing::info!("[{}] Stage: {} ({} records)", doc, stage, request.records.len());
        let cleaned: Vec<RawRecord> = request
            .records
            .iter()
            .map(|record| RawRecord {
                text: clean(&record.text),
                metadata: record.metadata.clone(),
            })
            .collect();

        *stage = IngestionStage::Splitting;
        let config = self.chunking.for_source(request.source_type);
        tracing::info!(
            "[{}] Stage: {} (size {}, overlap {})",
            doc,
            stage,
            config.chunk_size,
            config.chunk_overlap
        );
        let mut chunks = Vec::new();
        for record in &cleaned {
            for text in split(&record.text, &config)? {
                chunks.push(Chunk::new(text, record.metadata.clone()));
            }
        }
        if chunks.is_empty() {
            return Err(Error::split(format!(
                "no text left to split in '{}' after cleaning",
                request.source_name
            )));
        }

        *stage = IngestionStage::Validating;
        let candidates = chunks.len();
        let valid: Vec<Chunk> = chunks
            .into_iter()
            .enumerate()
            .filter_map(|(i, chunk)| match validate_chunk(&chunk.text, self.min_chunk_length) {
                Ok(()) => Some(chunk),
                Err(rejection) => {
                    tracing::warn!("[{}] Rejected chunk {}: {}", doc, i, rejection);
                    None
                }
            })
            .collect();
        let filtered_count = candidates - valid.len();
        if valid.is_empty() {
            return Err(Error::ValidationExhausted {
                rejected: filtered_count,
            });
        }
        if filtered_count > 0 {
            tracing::warn!(
                "[{}] Filtered {} of {} low-quality chunks",
                doc,
                filtered_count,
                candidates
            );
        }

        *stage = IngestionStage::Enriching;
        let enriched = enrich(&valid, doc, &request.source_name, &request.source_path);
        tracing::info!("[{}] Stage: {} ({} chunks)", doc, stage, enriched.len());

        let report = if request.store_in_vector_store {
            *stage = IngestionStage::Storing;
            tracing::info!("[{}] Stage: {} via {}", doc, stage, self.store.name());
            let report = self
                .store
                .upsert(&enriched, request.collection.as_deref())
                .await?;
            if report.is_total_failure() {
                let reason = report
                    .failures
                    .first()
                    .map(|f| f.reason.as_str())
                    .unwrap_or("no ids returned");
                return Err(Error::embedding(format!(
                    "No documents successfully embedded ({} failed): {}",
                    report.requested, reason
                )));
            }
            if report.is_partial() {
                tracing::warn!(
                    "[{}] {} of {} chunks failed to embed at positions {:?}",
                    doc,
                    report.failures.len(),
                    report.requested,
                    report.failed_indices()
                );
            }
            Some(report)
        } else {
            None
        };

        *stage = IngestionStage::Completed;
        let stats = ProcessingStats::from_chunks(&enriched, request.started_at.elapsed());
        let message = summary(&request.source_name, &enriched, filtered_count, report.as_ref());
        tracing::info!("[{}] {} in {}ms", doc, message, stats.processing_time_ms);

        let (vector_ids, failures) = match report {
            Some(report) => (Some(report.stored_ids), report.failures),
            None => (None, Vec::new()),
        };

        Ok(ProcessingResult {
            success: true,
            document_id: request.document_id.clone(),
            chunks_created: enriched.len(),
            chunks: enriched,
            stats,
            vector_ids,
            failed_count: failures.len(),
            filtered_count,
            failures,
            stage: IngestionStage::Completed,
            failed_stage: None,
            message,
            error: None,
        })
    }
}

fn summary(
    source_name: &str,
    chunks: &[EnrichedChunk],
    filtered: usize,
    report: Option<&UpsertReport>,
) -> String {
    let mut message = format!(
        "Successfully processed {} chunks from {}",
        chunks.len(),
        source_name
    );
    if filtered > 0 {
        message.push_str(&format!(" ({} low-quality chunks filtered)", filtered));
    }
    if let Some(report) = report.filter(|r| r.is_partial()) {
        message.push_str(&format!(
            "; {} of {} chunks failed to embed",
            report.failures.len(),
            report.requested
        ));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkSizing;
    use crate::types::ChunkFailure;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    const WORDS: &[&str] = &[
        "river", "stone", "market", "lantern", "harbor", "meadow", "signal", "copper",
        "garden", "winter", "engine", "pillar", "forest", "canvas", "ledger", "orbit",
    ];

    fn prose(seed: usize, words: usize) -> String {
        (0..words)
            .map(|i| format!("{}{}", WORDS[(seed + i) % WORDS.len()], seed * 1000 + i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Records every call; fails the whole call when `fail` is set and
    /// reports every chunk as failed without erroring when `store_nothing` is
    #[derive(Default)]
    struct RecordingStore {
        fail: bool,
        store_nothing: bool,
        calls: Mutex<Vec<(usize, Option<String>)>>,
    }

    #[async_trait]
    impl ChunkStore for RecordingStore {
        async fn upsert(
            &self,
            chunks: &[EnrichedChunk],
            collection: Option<&str>,
        ) -> Result<UpsertReport> {
            self.calls
                .lock()
                .push((chunks.len(), collection.map(str::to_string)));
            if self.fail {
                return Err(Error::embedding("service unavailable"));
            }
            if self.store_nothing {
                return Ok(UpsertReport {
                    requested: chunks.len(),
                    stored_ids: Vec::new(),
                    failures: (0..chunks.len())
                        .map(|index| ChunkFailure {
                            index,
                            reason: "quota exhausted".into(),
                        })
                        .collect(),
                });
            }
            Ok(UpsertReport {
                requested: chunks.len(),
                stored_ids: chunks.iter().map(|c| c.chunk_id.to_string()).collect(),
                failures: Vec::<ChunkFailure>::new(),
            })
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn pipeline(store: Arc<RecordingStore>) -> IngestPipeline {
        IngestPipeline::new(&RagConfig::default(), store)
    }

    #[tokio::test]
    async fn test_process_stores_once_with_collection() {
        let store = Arc::new(RecordingStore::default());
        let request = IngestRequest::new(vec![RawRecord::new(prose(1, 80))], "a.txt", SourceType::PlainText)
            .with_collection(Some("reports".into()));

        let result = pipeline(store.clone()).process(request).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.stage, IngestionStage::Completed);
        assert_eq!(result.vector_ids.as_ref().map(Vec::len), Some(result.chunks_created));
        assert_eq!(*store.calls.lock(), vec![(result.chunks_created, Some("reports".into()))]);
    }

    #[tokio::test]
    async fn test_all_chunks_rejected() {
        let store = Arc::new(RecordingStore::default());
        let request = IngestRequest::new(
            vec![RawRecord::new("12345 67890 !!! ### 000 111 222 333 444 555 666 777 888 999")],
            "numbers.txt",
            SourceType::PlainText,
        );

        let result = pipeline(store.clone()).process(request).await;
        assert!(!result.success);
        assert_eq!(result.failed_stage, Some(IngestionStage::Validating));
        assert!(result.error.unwrap().contains("repetitive"));
        assert!(result.chunks.is_empty());
        assert!(store.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_total_storage_failure_is_fatal() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let request = IngestRequest::new(vec![RawRecord::new(prose(2, 60))], "b.txt", SourceType::PlainText);

        let result = pipeline(store).process(request).await;
        assert!(!result.success);
        assert_eq!(result.failed_stage, Some(IngestionStage::Storing));
        assert_eq!(result.chunks_created, 0);
        assert!(result.error.unwrap().contains("service unavailable"));
    }

    #[tokio::test]
    async fn test_report_with_nothing_stored_is_fatal() {
        let store = Arc::new(RecordingStore {
            store_nothing: true,
            ..Default::default()
        });
        let request = IngestRequest::new(vec![RawRecord::new(prose(7, 60))], "e.txt", SourceType::PlainText);

        let result = pipeline(store.clone()).process(request).await;
        assert!(!result.success);
        assert_eq!(result.failed_stage, Some(IngestionStage::Storing));
        assert_eq!(result.chunks_created, 0);
        assert!(result.chunks.is_empty());
        assert!(result.error.unwrap().contains("quota exhausted"));
        assert_eq!(store.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_policy_fails_at_splitting() {
        let mut policy = ChunkingPolicy::default();
        policy.plain_text = ChunkSizing { chunk_size: 100, chunk_overlap: 100 };
        let pipeline = IngestPipeline::with_policy(policy, 50, Arc::new(RecordingStore::default()));
        let request = IngestRequest::new(vec![RawRecord::new(prose(3, 60))], "c.txt", SourceType::PlainText);

        let result = pipeline.process(request).await;
        assert_eq!(result.failed_stage, Some(IngestionStage::Splitting));
    }

    #[tokio::test]
    async fn test_filtered_chunks_reported_without_storage() {
        let store = Arc::new(RecordingStore::default());
        let request = IngestRequest::new(
            vec![RawRecord::new(prose(4, 40)), RawRecord::new("tiny")],
            "mixed",
            SourceType::Default,
        )
        .without_storage();

        let result = pipeline(store.clone()).process(request).await;
        assert!(result.success);
        assert_eq!(result.filtered_count, 1);
        assert_eq!(result.chunks_created, 1);
        assert!(result.vector_ids.is_none());
        assert!(result.message.contains("1 low-quality chunks filtered"));
        assert!(store.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_min_chunk_length_comes_from_config() {
        let text = prose(8, 6);
        let length = text.chars().count();
        assert!(length > 50 && length < 100, "{}", length);

        let request = || IngestRequest::new(vec![RawRecord::new(text.clone())], "f.txt", SourceType::PlainText)
            .without_storage();
        let store = Arc::new(RecordingStore::default());

        let result = pipeline(store.clone()).process(request()).await;
        assert!(result.success, "{:?}", result.error);

        let mut config = RagConfig::default();
        config.validation.min_chunk_length = 100;
        let result = IngestPipeline::new(&config, store).process(request()).await;
        assert_eq!(result.failed_stage, Some(IngestionStage::Validating));
    }

    #[tokio::test]
    async fn test_input_records_untouched() {
        let records = vec![RawRecord::new(format!("  {}   \n\n\n\n{}  ", prose(5, 30), prose(6, 30)))
            .with_meta("page_number", 1)];
        let before = records.clone();
        let request = IngestRequest::new(records.clone(), "d.txt", SourceType::PlainText).without_storage();

        let result = pipeline(Arc::new(RecordingStore::default())).process(request).await;
        assert!(result.success);
        assert_eq!(records, before);
        assert_eq!(result.chunks[0].page_number(), Some(1));
    }

    #[tokio::test]
    async fn test_process_all_keeps_units_apart() {
        let store = Arc::new(RecordingStore::default());
        let requests = (0..3)
            .map(|i| {
                IngestRequest::new(vec![RawRecord::new(prose(i, 50))], format!("{}.txt", i), SourceType::PlainText)
                    .with_document_id(format!("doc-{}", i))
            })
            .collect();

        let results = pipeline(store.clone()).process_all(requests).await;
        assert_eq!(results.len(), 3);
        for (i, result) in results.iter().enumerate() {
            assert!(result.success);
            assert!(result.chunks.iter().all(|c| c.document_id == format!("doc-{}", i)));
        }
        assert_eq!(store.calls.lock().len(), 3);
    }
}
