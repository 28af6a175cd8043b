//! Document ingestion pipeline: clean, split, validate, enrich, store

pub mod cleaner;
pub mod metadata;
pub mod processor;
pub mod splitter;
pub mod validator;

pub use cleaner::clean;
pub use metadata::{enrich, sanitize_metadata};
pub use processor::{IngestOptions, IngestPipeline, IngestRequest};
pub use splitter::{split, split_spans, ChunkSpan, ChunkingConfig, SourceType};
pub use validator::{is_valid_chunk, validate_chunk, Rejection};
