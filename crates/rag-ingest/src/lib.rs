//! rag-ingest: document ingestion and chunk-quality pipeline for RAG
//!
//! Loads PDF, DOCX, text, CSV and remote dataset rows into uniform records,
//! cleans scan artifacts, splits text into overlapping chunks with a
//! per-source-type policy, filters degenerate chunks, attaches provenance
//! metadata and hands the result to an embedding + vector store collaborator
//! that may fail partially. Questions are answered by an LLM grounded on the
//! retrieved chunks and the chat session's history.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod loaders;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, LoadError, Result};
pub use generation::{Answer, RagChain};
pub use ingestion::{IngestOptions, IngestPipeline, IngestRequest};
pub use loaders::{Source, SourceLoader};
pub use providers::ChunkStore;
pub use types::{
    Chunk, ChunkFailure, EnrichedChunk, IngestionStage, Metadata, ProcessingResult,
    ProcessingStats, RawRecord, UpsertReport,
};
