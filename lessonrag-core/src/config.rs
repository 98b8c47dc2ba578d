use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::chat::Locale;
use crate::rag::Metric;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole assistant.
///
/// Covers the completion and embedding providers, chunking, retrieval,
/// ingestion pacing and storage. Every section has defaults so a partial
/// `config.yaml` is enough.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Which HTTP backend serves completions and embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Ollama,
}

/// Configuration for the completion model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,
    /// Falls back to `OPENAI_API_KEY` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Configuration for the embedding model.
///
/// `dimension` is fixed at deployment time: every stored chunk and every
/// query vector must have exactly this many components.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
}

/// Configuration for text processing (chunking and noise filtering).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Window length in characters
    pub chunk_size: usize,
    /// Characters shared by neighbouring windows
    pub chunk_overlap: usize,
    /// Windows shorter than this after trimming are dropped as noise
    pub min_chunk_chars: usize,
    /// Extracted text shorter than this is never ingested
    pub min_content_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub limit: usize,
    pub threshold: f32,
    /// Number of chunks pulled into a chat prompt
    pub chat_limit: usize,
    pub metric: Metric,
}

/// Pacing for embedding during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Chunks per sub-batch (embedded together, written together)
    pub batch_size: usize,
    /// Concurrent embedding calls within a sub-batch
    pub concurrency: usize,
    /// Pause between sub-batches
    pub batch_delay_ms: u64,
    /// Retries for a rate-limited embedding call
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// How long a finished run's state stays visible to `status`
    pub status_retention_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Prior turns sent along with a query
    pub history_turns: usize,
    /// Upper bound on the assembled context block
    pub max_context_chars: usize,
    pub locale: Locale,
}

/// Vector database storage mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StorageMode {
    /// In-process store, nothing survives a restart (default)
    Memory,
    /// gRPC storage - connect to an external Qdrant server
    Grpc { url: String },
}

impl Default for StorageMode {
    fn default() -> Self {
        Self::Memory
    }
}

/// Storage configuration for chunk embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(default)]
    pub storage_mode: StorageMode,
    #[serde(default)]
    pub vector_db: VectorDbConfig,
}

/// Vector database configuration (collection/index name, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Collection/index name for storing vectors
    pub collection_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub socket_path: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model: "gpt-3.5-turbo".to_string(),
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            min_chunk_chars: 50,
            min_content_chars: 10,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            threshold: 0.7,
            chat_limit: 3,
            metric: Metric::Cosine,
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            concurrency: 3,
            batch_delay_ms: 200,
            max_retries: 2,
            retry_base_delay_ms: 500,
            status_retention_ms: 3_600_000,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_turns: 4,
            max_context_chars: 6000,
            locale: Locale::Arabic,
        }
    }
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            collection_name: "lesson_plan_embeddings".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            vector_db: VectorDbConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: "/tmp/lessonrag.sock".to_string(),
        }
    }
}

impl LlmConfig {
    /// The configured key, or `OPENAI_API_KEY` from the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("config.yaml").unwrap_or_default()
    }

    /// Rejects values no deployment can run with.
    ///
    /// An overlap at or above the chunk size is not rejected here; the
    /// chunker clamps it.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid("embedding.dimension must be positive".into()));
        }
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::Invalid("rag.chunk_size must be positive".into()));
        }
        if self.ingestion.batch_size == 0 || self.ingestion.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "ingestion.batch_size and ingestion.concurrency must be positive".into(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.threshold) {
            return Err(ConfigError::Invalid(format!(
                "retrieval.threshold {} is outside [-1, 1]",
                self.retrieval.threshold
            )));
        }
        Ok(())
    }
}
