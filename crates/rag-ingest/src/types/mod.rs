//! Core types flowing through the ingestion pipeline

pub mod document;
pub mod result;

pub use document::{Chunk, EnrichedChunk, Metadata, RawRecord};
pub use result::{
    ChunkFailure, IngestionStage, ProcessingResult, ProcessingStats, UpsertReport,
};
