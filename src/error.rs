//! Error types for the retrieval core.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors raised while turning a file into plain text.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read {path}: {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract {path}: {reason}")]
    ExtractionError { path: String, reason: String },
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,

    #[error("missing API key for embedding provider")]
    MissingApiKey,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ServerError(msg) => {
                let msg = msg.to_lowercase();
                ["429", "502", "503", "504", "unavailable", "too many requests"]
                    .iter()
                    .any(|needle| msg.contains(needle))
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) | EmbeddingError::MissingApiKey => false,
        }
    }
}

/// Errors raised by vector index backends.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("persistence error at {path}: {source}")]
    PersistenceError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("{backend} backend does not support {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },
}

impl VectorStoreError {
    pub(crate) fn persistence(path: &std::path::Path, source: std::io::Error) -> Self {
        VectorStoreError::PersistenceError {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Errors related to ingestion and index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("file too large ({size} bytes, maximum {max} bytes): {path}")]
    FileTooLarge { path: String, size: u64, max: u64 },

    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Errors related to conversation persistence.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("conversation error: {0}")]
    Conversation(#[from] ConversationError),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_retryable() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::ConnectionError("refused".to_string()).is_retryable());
        assert!(EmbeddingError::ServerError("status 503: busy".to_string()).is_retryable());
        assert!(!EmbeddingError::ServerError("status 400: bad input".to_string()).is_retryable());
        assert!(!EmbeddingError::InvalidResponse("short".to_string()).is_retryable());
        assert!(!EmbeddingError::MissingApiKey.is_retryable());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = VectorStoreError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch: index expects 384, got 3"
        );
    }
}
