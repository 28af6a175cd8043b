//! Configuration for the ingestion service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::ingestion::splitter::{default_separators, ChunkingConfig, SourceType};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Per-source-type chunking policy
    #[serde(default)]
    pub chunking: ChunkingPolicy,
    /// Chunk quality gate
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Answer generation configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Vector database configuration
    #[serde(default)]
    pub vector_db: VectorDbConfig,
    /// Remote dataset configuration
    #[serde(default)]
    pub datasets: DatasetConfig,
    /// Chat session configuration
    #[serde(default)]
    pub sessions: SessionConfig,
}

impl RagConfig {
    /// Load from an optional TOML file, then apply environment overrides
    ///
    /// Recognised variables: `GOOGLE_API_KEY`, `CHROMA_URL`, `RAG_HOST`,
    /// `RAG_PORT`, `RAG_UPLOAD_DIR`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                toml::from_str::<RagConfig>(&raw).map_err(|e| {
                    Error::Config(format!("Invalid config {}: {}", path.display(), e))
                })?
            }
            None => RagConfig::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("GOOGLE_API_KEY").filter(|k| !k.is_empty()) {
            self.embeddings.api_key = Some(key.clone());
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("CHROMA_URL").filter(|u| !u.is_empty()) {
            self.vector_db.url = url;
        }
        if let Some(host) = lookup("RAG_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("RAG_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(dir) = lookup("RAG_UPLOAD_DIR") {
            self.server.upload_dir = PathBuf::from(dir);
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        for source_type in [
            SourceType::Paginated,
            SourceType::Narrative,
            SourceType::PlainText,
            SourceType::Default,
        ] {
            self.chunking
                .for_source(source_type)
                .validate()
                .map_err(|e| Error::Config(format!("{:?} chunking policy: {}", source_type, e)))?;
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Config(format!(
                "llm.temperature ({}) must be between 0 and 2",
                self.llm.temperature
            )));
        }
        self.sessions.max_age()?;
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 20MB)
    pub max_upload_size: usize,
    /// Where uploaded files are written before loading
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 20 * 1024 * 1024,
            upload_dir: dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("rag-ingest")
                .join("uploads"),
        }
    }
}

/// Chunk size and overlap for one source type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkSizing {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Chunking policy table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingPolicy {
    /// PDFs and other paginated or structured content
    #[serde(default = "default_paginated")]
    pub paginated: ChunkSizing,
    /// Narrative documents
    #[serde(default = "default_narrative")]
    pub narrative: ChunkSizing,
    /// Plain text
    #[serde(default = "default_plain_text")]
    pub plain_text: ChunkSizing,
    /// Everything else
    #[serde(default = "default_sizing")]
    pub default: ChunkSizing,
    /// Separators tried in order
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

fn default_paginated() -> ChunkSizing {
    ChunkSizing { chunk_size: 1500, chunk_overlap: 250 }
}

fn default_narrative() -> ChunkSizing {
    ChunkSizing { chunk_size: 1200, chunk_overlap: 200 }
}

fn default_plain_text() -> ChunkSizing {
    ChunkSizing { chunk_size: 1000, chunk_overlap: 150 }
}

fn default_sizing() -> ChunkSizing {
    ChunkSizing { chunk_size: 1200, chunk_overlap: 200 }
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self {
            paginated: default_paginated(),
            narrative: default_narrative(),
            plain_text: default_plain_text(),
            default: default_sizing(),
            separators: default_separators(),
        }
    }
}

impl ChunkingPolicy {
    /// Splitter configuration for a source type
    pub fn for_source(&self, source_type: SourceType) -> ChunkingConfig {
        let sizing = match source_type {
            SourceType::Paginated => self.paginated,
            SourceType::Narrative => self.narrative,
            SourceType::PlainText => self.plain_text,
            SourceType::Default => self.default,
        };
        ChunkingConfig {
            chunk_size: sizing.chunk_size,
            chunk_overlap: sizing.chunk_overlap,
            separators: self.separators.clone(),
        }
    }
}

/// Chunk quality gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum trimmed length a chunk needs to reach the store
    pub min_chunk_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_chunk_length: 50,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Generative Language API base URL
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// API key (falls back to `GOOGLE_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Embedding dimensions
    pub dimensions: usize,
    /// Chunks per embedding request
    pub batch_size: usize,
    /// Pause between batches in milliseconds
    pub batch_delay_ms: u64,
    /// Pause after a failed batch in milliseconds
    pub error_delay_ms: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-embedding-001".to_string(),
            api_key: None,
            dimensions: 768,
            batch_size: 10,
            batch_delay_ms: 1000,
            error_delay_ms: 1500,
            timeout_secs: 60,
        }
    }
}

/// Answer generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Generative Language API base URL
    pub base_url: String,
    /// Generation model name
    pub model: String,
    /// API key (falls back to `GOOGLE_API_KEY`)
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_k: u32,
    pub top_p: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Chunks retrieved per question when the request names no count
    pub retrieval_k: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            api_key: None,
            temperature: 0.3,
            max_output_tokens: 2048,
            top_k: 40,
            top_p: 0.95,
            timeout_secs: 120,
            retrieval_k: 4,
        }
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbConfig {
    /// Chroma server URL (falls back to `CHROMA_URL`)
    pub url: String,
    /// Collection used when a request names none
    pub default_collection: String,
    /// Distance function for new collections
    pub distance: String,
    /// Keep vectors in process instead of talking to Chroma
    #[serde(default)]
    pub in_memory: bool,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            default_collection: "rag_documents".to_string(),
            distance: "cosine".to_string(),
            in_memory: false,
            timeout_secs: 30,
        }
    }
}

/// Remote dataset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// datasets-server base URL
    pub base_url: String,
    /// Split used when a request names none
    pub default_split: String,
    /// Rows fetched per request
    pub page_length: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://datasets-server.huggingface.co".to_string(),
            default_split: "train".to_string(),
            page_length: 100,
            timeout_secs: 30,
        }
    }
}

/// Chat session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle longer than this are expired
    pub max_age_hours: u64,
    /// Messages included in formatted history
    pub history_window: usize,
}

impl SessionConfig {
    /// Idle time after which a session expires
    pub fn max_age(&self) -> Result<chrono::Duration> {
        i64::try_from(self.max_age_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .ok_or_else(|| {
                Error::Config(format!(
                    "sessions.max_age_hours ({}) is out of range",
                    self.max_age_hours
                ))
            })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            history_window: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_policy_table() {
        let policy = ChunkingPolicy::default();
        let pdf = policy.for_source(SourceType::Paginated);
        assert_eq!((pdf.chunk_size, pdf.chunk_overlap), (1500, 250));
        let docx = policy.for_source(SourceType::Narrative);
        assert_eq!((docx.chunk_size, docx.chunk_overlap), (1200, 200));
        let txt = policy.for_source(SourceType::PlainText);
        assert_eq!((txt.chunk_size, txt.chunk_overlap), (1000, 150));
        let other = policy.for_source(SourceType::Default);
        assert_eq!((other.chunk_size, other.chunk_overlap), (1200, 200));
        assert_eq!(other.separators, vec!["\n\n", "\n", ". ", " ", ""]);
    }

    #[test]
    fn test_partial_toml() {
        let config: RagConfig = toml::from_str(
            r#"
            [chunking.plain_text]
            chunk_size = 800
            chunk_overlap = 100

            [validation]
            min_chunk_length = 80

            [llm]
            model = "gemini-2.5-flash"
            "#,
        )
        .unwrap();

        assert_eq!(config.chunking.plain_text.chunk_size, 800);
        assert_eq!(config.chunking.paginated.chunk_size, 1500);
        assert_eq!(config.validation.min_chunk_length, 80);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.llm.max_output_tokens, 2048);
        assert_eq!(config.vector_db.default_collection, "rag_documents");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("GOOGLE_API_KEY", "secret"),
            ("CHROMA_URL", "http://chroma:8000"),
            ("RAG_PORT", "9090"),
        ]
        .into_iter()
        .collect();

        let mut config = RagConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.embeddings.api_key.as_deref(), Some("secret"));
        assert_eq!(config.llm.api_key.as_deref(), Some("secret"));
        assert_eq!(config.vector_db.url, "http://chroma:8000");
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_rejects_out_of_range_session_age() {
        let mut config = RagConfig::default();
        assert_eq!(config.sessions.max_age().unwrap(), chrono::Duration::hours(24));

        config.sessions.max_age_hours = u64::MAX;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.sessions.max_age_hours = i64::MAX as u64;
        assert!(matches!(config.sessions.max_age(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let mut config = RagConfig::default();
        config.chunking.narrative = ChunkSizing { chunk_size: 200, chunk_overlap: 200 };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
