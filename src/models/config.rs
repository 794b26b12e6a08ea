use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;
pub const DEFAULT_CHUNK_SIZE: u32 = 1000;
pub const DEFAULT_CHUNK_OVERLAP: u32 = 200;
pub const DEFAULT_TOP_K: u32 = 5;
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("docrag").join("config.toml"))
    }

    /// Load the config file (defaults when absent), then apply environment
    /// overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;

        let content = toml::to_string_pretty(self)?;
        crate::utils::write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }

    /// Apply `KEY=value` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("DOCRAG_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup("CHUNK_SIZE") {
            self.indexing.chunk_size = parse_number("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("CHUNK_OVERLAP") {
            self.indexing.chunk_overlap = parse_number("CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("MAX_UPLOAD_SIZE_MB") {
            let mb: u64 = parse_number("MAX_UPLOAD_SIZE_MB", &v)?;
            self.indexing.max_file_size = mb * 1024 * 1024;
        }
        if let Some(v) = lookup("VECTOR_STORE_TYPE") {
            self.vector_store.driver = v.parse().map_err(ConfigError::ValidationError)?;
        }
        if let Some(v) = lookup("TOP_K_RESULTS") {
            self.search.top_k = parse_number("TOP_K_RESULTS", &v)?;
        }
        if let Some(v) = lookup("EMBEDDING_URL") {
            self.embedding.url = v;
        }
        if let Some(v) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(key) = lookup("EMBEDDING_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.embedding.api_key = Some(key);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.indexing.chunk_size == 0 {
            return invalid("chunk_size must be greater than 0");
        }
        if self.indexing.chunk_overlap >= self.indexing.chunk_size {
            return invalid("chunk_overlap must be smaller than chunk_size");
        }
        if self.search.top_k == 0 {
            return invalid("top_k must be greater than 0");
        }
        if self.embedding.dimension == 0 {
            return invalid("embedding dimension must be greater than 0");
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding batch_size must be greater than 0");
        }
        Ok(())
    }

    pub fn vector_store_dir(&self) -> PathBuf {
        self.storage.data_dir.join("vector_store")
    }

    pub fn conversations_dir(&self) -> PathBuf {
        self.storage.data_dir.join("conversations")
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} must be a number, got '{value}'")))
}

/// Wire dialect spoken by the embedding server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingApi {
    /// `POST /embeddings` with `{model, input}` and a bearer key.
    #[default]
    OpenAi,
    /// `POST /embed` with `{inputs}` (text-embeddings-inference).
    Tei,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub api: EmbeddingApi,

    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Only used by the offline hashing embedder; HTTP providers define
    /// their own dimensionality.
    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_timeout() -> u64 {
    30
}

fn default_batch_size() -> u32 {
    32
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api: EmbeddingApi::default(),
            url: default_embedding_url(),
            model: default_embedding_model(),
            api_key: None,
            dimension: default_dimension(),
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
        }
    }
}

/// Vector index backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    /// Append-only flat index; deletions rebuild it from the surviving records.
    #[default]
    Flat,
    /// SQLite-backed index with native per-record deletion.
    Sqlite,
}

impl VectorDriver {
    pub fn name(self) -> &'static str {
        match self {
            VectorDriver::Flat => "flat",
            VectorDriver::Sqlite => "sqlite",
        }
    }
}

impl std::str::FromStr for VectorDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat" | "faiss" => Ok(VectorDriver::Flat),
            "sqlite" | "chroma" => Ok(VectorDriver::Sqlite),
            other => Err(format!(
                "unknown vector store type '{other}' (expected 'flat' or 'sqlite')"
            )),
        }
    }
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    /// Characters repeated between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,
}

fn default_chunk_size() -> u32 {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> u32 {
    DEFAULT_CHUNK_OVERLAP
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE_MB * 1024 * 1024
}

fn default_supported_extensions() -> Vec<String> {
    [".txt", ".csv", ".html", ".htm"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_file_size: default_max_file_size(),
            supported_extensions: default_supported_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default)]
    pub default_format: OutputFormat,
}

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            default_format: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("docrag"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.indexing.chunk_size, 1000);
        assert_eq!(config.indexing.chunk_overlap, 200);
        assert_eq!(config.indexing.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.vector_store.driver, VectorDriver::Flat);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[vector_store]\ndriver = \"sqlite\"\n").unwrap();
        assert_eq!(config.vector_store.driver, VectorDriver::Sqlite);
        assert_eq!(config.indexing.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.embedding.model, DEFAULT_EMBEDDING_MODEL);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup_from(&[
                ("CHUNK_SIZE", "500"),
                ("CHUNK_OVERLAP", "50"),
                ("VECTOR_STORE_TYPE", "chroma"),
                ("TOP_K_RESULTS", "3"),
                ("MAX_UPLOAD_SIZE_MB", "2"),
                ("OPENAI_API_KEY", "sk-test"),
                ("DOCRAG_DATA_DIR", "/tmp/docrag-data"),
            ]))
            .unwrap();

        assert_eq!(config.indexing.chunk_size, 500);
        assert_eq!(config.indexing.chunk_overlap, 50);
        assert_eq!(config.vector_store.driver, VectorDriver::Sqlite);
        assert_eq!(config.search.top_k, 3);
        assert_eq!(config.indexing.max_file_size, 2 * 1024 * 1024);
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
        assert_eq!(
            config.conversations_dir(),
            PathBuf::from("/tmp/docrag-data/conversations")
        );
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup_from(&[("CHUNK_SIZE", "large")]))
            .unwrap_err();
        assert!(err.to_string().contains("CHUNK_SIZE"));

        let err = config
            .apply_overrides(lookup_from(&[("VECTOR_STORE_TYPE", "pinecone")]))
            .unwrap_err();
        assert!(err.to_string().contains("pinecone"));
    }

    #[test]
    fn test_validate_overlap() {
        let mut config = Config::default();
        config.indexing.chunk_overlap = config.indexing.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_driver_parse() {
        assert_eq!("FAISS".parse::<VectorDriver>(), Ok(VectorDriver::Flat));
        assert_eq!("sqlite".parse::<VectorDriver>(), Ok(VectorDriver::Sqlite));
        assert!("other".parse::<VectorDriver>().is_err());
    }
}
