//! Source-aware vector index over a pluggable backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::embedding::EmbeddingProvider;
use super::vector_store::{self, IndexRecord, VectorBackend};
use crate::error::{EmbeddingError, IndexError, VectorStoreError};
use crate::models::{Chunk, ScoredChunk, VectorDriver};

/// Embeds chunks and keeps them in the configured backend.
///
/// The backend is created lazily by the first successful [`VectorIndex::add`];
/// until then every read behaves as if the index were empty.
pub struct VectorIndex {
    driver: VectorDriver,
    root: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    backend: Option<Box<dyn VectorBackend>>,
}

impl VectorIndex {
    /// An index with nothing loaded from disk.
    pub fn new(driver: VectorDriver, root: &Path, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            driver,
            root: root.to_path_buf(),
            provider,
            backend: None,
        }
    }

    /// Open the persisted index under `root`. A missing or unreadable
    /// snapshot yields an empty index.
    pub fn load(driver: VectorDriver, root: &Path, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let mut index = Self::new(driver, root, provider);

        match vector_store::load_backend(driver, root) {
            Ok(Some(backend)) => {
                match backend.len() {
                    Ok(count) => info!("loaded {} index with {} records", driver, count),
                    Err(e) => warn!("loaded {} index but could not count records: {}", driver, e),
                }
                index.backend = Some(backend);
            }
            Ok(None) => debug!("no {} snapshot under {}", driver, root.display()),
            Err(e) => warn!(
                "could not load {} index from {}: {}; starting empty",
                driver,
                root.display(),
                e
            ),
        }

        index
    }

    pub fn driver(&self) -> VectorDriver {
        self.driver
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed and insert `chunks`. Either all of them are added or none.
    pub async fn add(&mut self, chunks: Vec<Chunk>) -> Result<usize, IndexError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors = self.embed_chunks(&chunks).await?;
        let dimension = self.checked_dimension(&vectors)?;
        self.insert_embedded(chunks, vectors, dimension)
    }

    /// Replace every chunk of `source` with `chunks`.
    ///
    /// The new chunks are embedded and checked before the old ones are
    /// removed, so a provider failure leaves the previous version in place.
    pub async fn replace_source(&mut self, source: &str, chunks: Vec<Chunk>) -> Result<usize, IndexError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let vectors = self.embed_chunks(&chunks).await?;
        let dimension = self.checked_dimension(&vectors)?;

        if self.delete_by_source(source)? {
            debug!("replacing existing chunks of '{}'", source);
        }
        self.insert_embedded(chunks, vectors, dimension)
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, IndexError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.provider.embed_batch(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            ))
            .into());
        }
        Ok(vectors)
    }

    /// The dimension every vector must have: the backend's, or the first
    /// vector's when no backend exists yet.
    fn checked_dimension(&self, vectors: &[Vec<f32>]) -> Result<usize, IndexError> {
        let dimension = match &self.backend {
            Some(backend) => backend.dimension(),
            None => vectors.first().map_or(0, Vec::len),
        };
        if dimension == 0 {
            return Err(EmbeddingError::InvalidResponse("empty embedding vector".to_string()).into());
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            }
            .into());
        }
        Ok(dimension)
    }

    fn insert_embedded(
        &mut self,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        dimension: usize,
    ) -> Result<usize, IndexError> {
        let (mut backend, created) = match self.backend.take() {
            Some(existing) => (existing, false),
            None => {
                vector_store::remove_snapshot(self.driver, &self.root)?;
                let backend = vector_store::create_backend(self.driver, &self.root, dimension)?;
                info!("created {} index (dimension {})", self.driver, dimension);
                (backend, true)
            }
        };

        let count = chunks.len();
        if let Err(e) = backend.insert(vectors.into_iter().zip(chunks).collect()) {
            if created {
                drop(backend);
                let _ = vector_store::remove_snapshot(self.driver, &self.root);
            } else {
                self.backend = Some(backend);
            }
            return Err(e.into());
        }

        let backend = self.backend.insert(backend);
        backend.persist()?;

        debug!("added {} chunks", count);
        Ok(count)
    }

    /// The `k` chunks nearest to `query`, closest first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>, IndexError> {
        Ok(self
            .search_with_scores(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.chunk)
            .collect())
    }

    pub async fn search_with_scores(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let Some(backend) = &self.backend else {
            return Ok(Vec::new());
        };
        if backend.is_empty()? {
            return Ok(Vec::new());
        }

        let vector = self.provider.embed(query).await?;
        Ok(backend.search(&vector, k)?)
    }

    /// Remove every chunk of `source`. Returns `false` when nothing matched.
    pub fn delete_by_source(&mut self, source: &str) -> Result<bool, IndexError> {
        let Some(backend) = self.backend.as_mut() else {
            return Ok(false);
        };

        if backend.supports_removal() {
            let ids = backend.ids_for_source(source)?;
            if ids.is_empty() {
                return Ok(false);
            }

            let deleted = backend.delete_ids(&ids)?;
            if backend.is_empty()? {
                self.reset()?;
            } else {
                backend.persist()?;
            }
            info!("deleted {} chunks of '{}'", deleted, source);
            return Ok(true);
        }

        let dimension = backend.dimension();
        let (removed, kept): (Vec<IndexRecord>, Vec<IndexRecord>) = backend
            .records()?
            .into_iter()
            .partition(|r| r.chunk.source() == source);

        if removed.is_empty() {
            return Ok(false);
        }

        if kept.is_empty() {
            vector_store::remove_snapshot(self.driver, &self.root)?;
            self.backend = None;
        } else {
            debug!("rebuilding {} index from {} records", self.driver, kept.len());
            let rebuilt = vector_store::rebuild_backend(self.driver, &self.root, dimension, kept)?;
            rebuilt.persist()?;
            self.backend = Some(rebuilt);
        }

        info!("deleted {} chunks of '{}'", removed.len(), source);
        Ok(true)
    }

    /// Drop every record and the on-disk snapshot.
    pub fn clear(&mut self) -> Result<(), IndexError> {
        self.reset()?;
        info!("cleared {} index", self.driver);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), VectorStoreError> {
        self.backend = None;
        vector_store::remove_snapshot(self.driver, &self.root)
    }

    /// Distinct sources of the live records, sorted.
    pub fn get_all_sources(&self) -> Result<Vec<String>, IndexError> {
        match &self.backend {
            Some(backend) => Ok(backend.sources()?),
            None => Ok(Vec::new()),
        }
    }

    pub fn count(&self) -> Result<usize, IndexError> {
        match &self.backend {
            Some(backend) => Ok(backend.len()?),
            None => Ok(0),
        }
    }

    /// Every stored chunk in insertion order.
    pub fn chunks(&self) -> Result<Vec<Chunk>, IndexError> {
        match &self.backend {
            Some(backend) => Ok(backend.records()?.into_iter().map(|r| r.chunk).collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn persist(&self) -> Result<(), IndexError> {
        if let Some(backend) = &self.backend {
            backend.persist()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use crate::services::embedding::HashEmbedder;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn chunk(source: &str, text: &str) -> Chunk {
        Chunk::new(text, ChunkMetadata::for_source(source))
    }

    fn hash_index(driver: VectorDriver, root: &Path) -> VectorIndex {
        VectorIndex::new(driver, root, Arc::new(HashEmbedder::new(384)))
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::ConnectionError("refused".to_string()))
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    struct FixedDimension(usize);

    #[async_trait]
    impl EmbeddingProvider for FixedDimension {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0; self.0]).collect())
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_reads_on_absent_index() {
        let dir = TempDir::new().unwrap();
        let mut index = hash_index(VectorDriver::Flat, dir.path());

        assert_eq!(index.count().unwrap(), 0);
        assert!(index.get_all_sources().unwrap().is_empty());
        assert!(index.search("anything", 5).await.unwrap().is_empty());
        assert!(!index.delete_by_source("a.txt").unwrap());
        index.clear().unwrap();
        index.clear().unwrap();
    }

    #[tokio::test]
    async fn test_blank_query_returns_nothing() {
        let dir = TempDir::new().unwrap();
        let mut index = hash_index(VectorDriver::Flat, dir.path());
        index.add(vec![chunk("a.txt", "Hello world")]).await.unwrap();

        assert!(index.search("   ", 3).await.unwrap().is_empty());
        assert!(index.search("hello", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_index_untouched() {
        let dir = TempDir::new().unwrap();
        let mut index = VectorIndex::new(VectorDriver::Flat, dir.path(), Arc::new(FailingProvider));

        let err = index.add(vec![chunk("a.txt", "text")]).await.unwrap_err();
        assert!(matches!(err, IndexError::Embedding(_)));
        assert_eq!(index.count().unwrap(), 0);
        assert!(!vector_store::snapshot_dir(VectorDriver::Flat, dir.path()).exists());
    }

    #[tokio::test]
    async fn test_dimension_change_fails_fast() {
        let dir = TempDir::new().unwrap();
        let mut index = VectorIndex::new(VectorDriver::Sqlite, dir.path(), Arc::new(FixedDimension(4)));
        index.add(vec![chunk("a.txt", "one")]).await.unwrap();

        let mut reopened =
            VectorIndex::load(VectorDriver::Sqlite, dir.path(), Arc::new(FixedDimension(8)));
        let err = reopened.add(vec![chunk("b.txt", "two")]).await.unwrap_err();
        assert!(matches!(
            err,
            IndexError::VectorStore(VectorStoreError::DimensionMismatch { expected: 4, actual: 8 })
        ));
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deleting_last_source_resets_index() {
        for driver in [VectorDriver::Flat, VectorDriver::Sqlite] {
            let dir = TempDir::new().unwrap();
            let mut index = hash_index(driver, dir.path());
            index.add(vec![chunk("a.txt", "only one")]).await.unwrap();

            assert!(index.delete_by_source("a.txt").unwrap());
            assert_eq!(index.count().unwrap(), 0);
            assert!(!vector_store::snapshot_dir(driver, dir.path()).exists());

            index.add(vec![chunk("b.txt", "fresh start")]).await.unwrap();
            assert_eq!(index.get_all_sources().unwrap(), vec!["b.txt"]);
        }
    }

    #[tokio::test]
    async fn test_flat_delete_rebuilds_without_reembedding() {
        let dir = TempDir::new().unwrap();
        let mut index = hash_index(VectorDriver::Flat, dir.path());
        index
            .add(vec![
                chunk("a.txt", "alpha document"),
                chunk("b.txt", "beta document"),
                chunk("c.txt", "gamma document"),
            ])
            .await
            .unwrap();

        // Swap in a provider that cannot embed; the rebuild must not need it.
        index.provider = Arc::new(FailingProvider);
        assert!(index.delete_by_source("b.txt").unwrap());

        let sources = index.get_all_sources().unwrap();
        assert_eq!(sources, vec!["a.txt", "c.txt"]);

        let reloaded =
            VectorIndex::load(VectorDriver::Flat, dir.path(), Arc::new(HashEmbedder::new(384)));
        assert_eq!(reloaded.get_all_sources().unwrap(), sources);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_loads_empty() {
        let dir = TempDir::new().unwrap();
        let snapshot = vector_store::snapshot_dir(VectorDriver::Flat, dir.path());
        std::fs::create_dir_all(&snapshot).unwrap();
        std::fs::write(snapshot.join("index.json"), "garbage").unwrap();

        let mut index = VectorIndex::load(VectorDriver::Flat, dir.path(), Arc::new(HashEmbedder::new(16)));
        assert_eq!(index.count().unwrap(), 0);

        index.add(vec![chunk("a.txt", "recovered")]).await.unwrap();
        assert_eq!(index.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_source_keeps_one_copy() {
        for driver in [VectorDriver::Flat, VectorDriver::Sqlite] {
            let dir = TempDir::new().unwrap();
            let mut index = hash_index(driver, dir.path());
            index
                .add(vec![chunk("a.txt", "Hello world"), chunk("b.txt", "Goodbye world")])
                .await
                .unwrap();

            let added = index
                .replace_source("a.txt", vec![chunk("a.txt", "Hello again")])
                .await
                .unwrap();
            assert_eq!(added, 1);
            assert_eq!(index.count().unwrap(), 2);

            let texts: Vec<String> = index
                .chunks()
                .unwrap()
                .into_iter()
                .filter(|c| c.source() == "a.txt")
                .map(|c| c.text)
                .collect();
            assert_eq!(texts, vec!["Hello again"]);
        }
    }

    #[tokio::test]
    async fn test_replace_source_keeps_old_chunks_when_embedding_fails() {
        let dir = TempDir::new().unwrap();
        let mut index = hash_index(VectorDriver::Flat, dir.path());
        index.add(vec![chunk("a.txt", "Hello world")]).await.unwrap();

        index.provider = Arc::new(FailingProvider);
        let err = index
            .replace_source("a.txt", vec![chunk("a.txt", "Hello again")])
            .await
            .unwrap_err();

        assert!(matches!(err, IndexError::Embedding(_)));
        assert_eq!(index.count().unwrap(), 1);
        assert_eq!(index.chunks().unwrap()[0].text, "Hello world");
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_index() {
        let dir = TempDir::new().unwrap();
        let mut index = hash_index(VectorDriver::Flat, dir.path());
        index
            .add(vec![chunk("a.txt", "Hello world"), chunk("b.txt", "Goodbye world")])
            .await
            .unwrap();

        // A directory where the temp snapshot goes makes the rebuilt index
        // impossible to persist.
        let snapshot = vector_store::snapshot_dir(VectorDriver::Flat, dir.path());
        std::fs::create_dir(snapshot.join("index.json.tmp")).unwrap();

        let err = index.delete_by_source("a.txt").unwrap_err();
        assert!(matches!(err, IndexError::VectorStore(_)));

        assert_eq!(index.count().unwrap(), 2);
        assert_eq!(index.get_all_sources().unwrap(), vec!["a.txt", "b.txt"]);
        let hits = index.search("Hello", 1).await.unwrap();
        assert_eq!(hits[0].source(), "a.txt");

        let reloaded =
            VectorIndex::load(VectorDriver::Flat, dir.path(), Arc::new(HashEmbedder::new(384)));
        assert_eq!(reloaded.count().unwrap(), 2);
    }
}
