//! Provider abstractions for embeddings, vector storage, chunk persistence
//! and answer generation
//!
//! Trait-based so the pipeline can run against Gemini + Chroma in production
//! and in-process fakes in tests.

pub mod chroma;
pub mod chunk_store;
pub mod embedding;
pub mod gemini;
pub mod gemini_client;
pub mod llm;
pub mod memory;
pub mod vector_store;

pub use chroma::ChromaVectorStore;
pub use chunk_store::{ChunkStore, EmbeddingStore};
pub use embedding::EmbeddingProvider;
pub use gemini::GeminiEmbedder;
pub use gemini_client::GeminiClient;
pub use llm::LlmProvider;
pub use memory::InMemoryVectorStore;
pub use vector_store::{CollectionInfo, VectorMatch, VectorRecord, VectorStoreProvider};
