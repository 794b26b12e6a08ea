//! Ingestion and query facade shared by the CLI and library callers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::chunker::TextChunker;
use super::embedding::EmbeddingProvider;
use super::extractor::{self, DocumentFormat};
use super::index::VectorIndex;
use crate::error::{ExtractError, IndexError};
use crate::models::{
    Chunk, ChunkMetadata, Config, IndexStats, IndexStatus, IndexingConfig, ScoredChunk,
    VectorDriver,
};
use crate::utils::file::has_supported_extension;
use crate::utils::{file_extension, source_name, validate_file};

/// Result of ingesting one file.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestOutcome {
    Indexed { source: String, chunks: usize },
    Skipped { source: String, reason: String },
    Failed { source: String, reason: String },
}

impl IngestOutcome {
    pub fn source(&self) -> &str {
        match self {
            IngestOutcome::Indexed { source, .. }
            | IngestOutcome::Skipped { source, .. }
            | IngestOutcome::Failed { source, .. } => source,
        }
    }
}

/// Per-file results of a batch ingestion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub outcomes: Vec<IngestOutcome>,
}

impl IngestReport {
    pub fn indexed_files(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, IngestOutcome::Indexed { .. }))
            .count()
    }

    pub fn total_chunks(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                IngestOutcome::Indexed { chunks, .. } => *chunks,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &IngestOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, IngestOutcome::Failed { .. }))
    }
}

/// Owns the vector index behind a read-write lock: mutations take it
/// exclusively, queries share it.
pub struct Retriever {
    index: RwLock<VectorIndex>,
    chunker: TextChunker,
    indexing: IndexingConfig,
    top_k: usize,
}

impl Retriever {
    /// Load the index configured in `config`, falling back to an empty one.
    pub fn open(config: &Config, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let index = VectorIndex::load(config.vector_store.driver, &config.vector_store_dir(), provider);
        Self::with_index(index, config)
    }

    pub fn with_index(index: VectorIndex, config: &Config) -> Self {
        Self {
            index: RwLock::new(index),
            chunker: TextChunker::new(&config.indexing),
            indexing: config.indexing.clone(),
            top_k: config.search.top_k as usize,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Validate, extract, chunk and index one file, replacing any chunks
    /// already indexed under the same source. Returns the number of chunks
    /// added; a file without text adds none.
    pub async fn ingest_file(&self, path: &Path) -> Result<usize, IndexError> {
        let file_size = validate_file(path, self.indexing.max_file_size)?;

        let extension = file_extension(path);
        if !has_supported_extension(path, &self.indexing.supported_extensions) {
            return Err(ExtractError::UnsupportedFormat(extension).into());
        }
        let format = DocumentFormat::from_path(path)?;

        let source = source_name(path);
        let text = extractor::extract(path, format)?;

        let base = ChunkMetadata {
            source: source.clone(),
            extension,
            file_size,
            file_path: Some(path.display().to_string()),
            ..Default::default()
        };
        let chunks = self.chunker.chunk(&text, &base);
        if chunks.is_empty() {
            warn!("no text found in {}", source);
            return Ok(0);
        }

        // A file indexed again replaces its earlier chunks.
        let added = self
            .index
            .write()
            .await
            .replace_source(&source, chunks)
            .await?;
        info!("indexed {} ({} chunks)", source, added);
        Ok(added)
    }

    /// Ingest every file; one failure does not stop the rest.
    pub async fn ingest_files(&self, paths: &[PathBuf]) -> IngestReport {
        let mut report = IngestReport::default();
        for path in paths {
            report.outcomes.push(self.ingest_outcome(path).await);
        }
        report
    }

    pub async fn ingest_outcome(&self, path: &Path) -> IngestOutcome {
        let source = source_name(path);
        match self.ingest_file(path).await {
            Ok(0) => IngestOutcome::Skipped {
                source,
                reason: "no extractable text".to_string(),
            },
            Ok(chunks) => IngestOutcome::Indexed { source, chunks },
            Err(e) => {
                warn!("failed to index {}: {}", source, e);
                IngestOutcome::Failed {
                    source,
                    reason: e.to_string(),
                }
            }
        }
    }

    pub async fn add(&self, chunks: Vec<Chunk>) -> Result<usize, IndexError> {
        self.index.write().await.add(chunks).await
    }

    /// Nearest chunks for `query`; `k` defaults to the configured top-k.
    pub async fn search(&self, query: &str, k: Option<usize>) -> Result<Vec<Chunk>, IndexError> {
        let k = k.unwrap_or(self.top_k);
        self.index.read().await.search(query, k).await
    }

    pub async fn search_with_scores(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let k = k.unwrap_or(self.top_k);
        self.index.read().await.search_with_scores(query, k).await
    }

    pub async fn delete_source(&self, source: &str) -> Result<bool, IndexError> {
        self.index.write().await.delete_by_source(source)
    }

    pub async fn clear(&self) -> Result<(), IndexError> {
        self.index.write().await.clear()
    }

    pub async fn persist(&self) -> Result<(), IndexError> {
        self.index.write().await.persist()
    }

    pub async fn sources(&self) -> Result<Vec<String>, IndexError> {
        self.index.read().await.get_all_sources()
    }

    pub async fn count(&self) -> Result<usize, IndexError> {
        self.index.read().await.count()
    }

    pub async fn chunks(&self) -> Result<Vec<Chunk>, IndexError> {
        self.index.read().await.chunks()
    }

    pub async fn driver(&self) -> VectorDriver {
        self.index.read().await.driver()
    }

    pub async fn stats(&self) -> Result<IndexStats, IndexError> {
        let index = self.index.read().await;
        let sources = index.get_all_sources()?;
        let total_chunks = index.count()?;

        Ok(IndexStats {
            status: if total_chunks == 0 {
                IndexStatus::Empty
            } else {
                IndexStatus::Ready
            },
            total_chunks,
            total_sources: sources.len(),
            sources,
            backend: index.driver().to_string(),
            embedding_model: index.provider().model().to_string(),
            top_k: self.top_k as u32,
        })
    }
}
