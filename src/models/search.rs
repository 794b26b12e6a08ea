//! Search and index statistics models.

use serde::{Deserialize, Serialize};

use super::chunk::Chunk;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// A chunk returned by a search with its distance under the backend metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,

    /// Lower is closer.
    pub distance: f32,
}

/// Collection of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// Query that was executed
    pub query: String,

    pub results: Vec<ScoredChunk>,

    /// Query execution time in milliseconds
    pub duration_ms: u64,
}

impl SearchResults {
    pub fn new(query: String, results: Vec<ScoredChunk>, duration_ms: u64) -> Self {
        Self {
            query,
            results,
            duration_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Empty,
    Ready,
}

/// Aggregate view of the index for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub status: IndexStatus,
    pub total_chunks: usize,
    pub total_sources: usize,
    pub sources: Vec<String>,
    pub backend: String,
    pub embedding_model: String,
    pub top_k: u32,
}
