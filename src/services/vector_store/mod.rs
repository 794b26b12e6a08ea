//! Vector index backends.
//!
//! Two strategies sit behind [`VectorBackend`]: an append-only flat index that
//! must be rebuilt to drop records, and a SQLite index that deletes records in
//! place. The backend is picked from configuration through the factory
//! functions below; callers never see which one they hold.

mod flat;
mod sqlite;

pub use flat::FlatIndex;
pub use sqlite::SqliteIndex;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::VectorStoreError;
use crate::models::{Chunk, ScoredChunk, VectorDriver};
use crate::utils::file::remove_path;

/// Backend-assigned record handle. Only meaningful to the backend that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub(crate) fn raw(self) -> u64 {
        self.0
    }
}

/// A stored embedding together with the chunk it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: RecordId,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

pub trait VectorBackend: Send + Sync {
    fn kind(&self) -> VectorDriver;

    /// Dimensionality fixed when the backend was created.
    fn dimension(&self) -> usize;

    fn len(&self) -> Result<usize, VectorStoreError>;

    fn is_empty(&self) -> Result<bool, VectorStoreError> {
        Ok(self.len()? == 0)
    }

    /// Insert all entries or none of them.
    fn insert(&mut self, entries: Vec<(Vec<f32>, Chunk)>) -> Result<Vec<RecordId>, VectorStoreError>;

    /// The `k` nearest records, closest first, ties in insertion order.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    /// Every live record in insertion order.
    fn records(&self) -> Result<Vec<IndexRecord>, VectorStoreError>;

    /// Whether [`VectorBackend::delete_ids`] is available.
    fn supports_removal(&self) -> bool;

    fn delete_ids(&mut self, ids: &[RecordId]) -> Result<usize, VectorStoreError>;

    fn persist(&self) -> Result<(), VectorStoreError>;

    fn ids_for_source(&self, source: &str) -> Result<Vec<RecordId>, VectorStoreError> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| r.chunk.source() == source)
            .map(|r| r.id)
            .collect())
    }

    /// Distinct sources of the live records, sorted.
    fn sources(&self) -> Result<Vec<String>, VectorStoreError> {
        let sources: BTreeSet<String> = self
            .records()?
            .into_iter()
            .map(|r| r.chunk.metadata.source)
            .collect();
        Ok(sources.into_iter().collect())
    }
}

pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), VectorStoreError> {
    if vector.len() != expected {
        return Err(VectorStoreError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Directory holding the snapshot of `driver` under the vector store root.
pub fn snapshot_dir(driver: VectorDriver, root: &Path) -> PathBuf {
    root.join(driver.name())
}

/// Create an empty backend for vectors of `dimension`.
pub fn create_backend(
    driver: VectorDriver,
    root: &Path,
    dimension: usize,
) -> Result<Box<dyn VectorBackend>, VectorStoreError> {
    let dir = snapshot_dir(driver, root);
    match driver {
        VectorDriver::Flat => Ok(Box::new(FlatIndex::new(&dir, dimension))),
        VectorDriver::Sqlite => Ok(Box::new(SqliteIndex::create(&dir, dimension)?)),
    }
}

/// Open the persisted backend, or `None` when no snapshot exists.
pub fn load_backend(
    driver: VectorDriver,
    root: &Path,
) -> Result<Option<Box<dyn VectorBackend>>, VectorStoreError> {
    let dir = snapshot_dir(driver, root);
    match driver {
        VectorDriver::Flat => Ok(FlatIndex::load(&dir)?.map(|b| Box::new(b) as Box<dyn VectorBackend>)),
        VectorDriver::Sqlite => {
            Ok(SqliteIndex::open(&dir)?.map(|b| Box::new(b) as Box<dyn VectorBackend>))
        }
    }
}

/// Build a fresh backend holding exactly `records`, reusing their vectors.
///
/// Only needed for backends without native removal. The result lives in
/// memory until persisted, so the previous snapshot stays intact until then.
pub fn rebuild_backend(
    driver: VectorDriver,
    root: &Path,
    dimension: usize,
    records: Vec<IndexRecord>,
) -> Result<Box<dyn VectorBackend>, VectorStoreError> {
    match driver {
        VectorDriver::Flat => {
            let mut rebuilt = FlatIndex::new(&snapshot_dir(driver, root), dimension);
            rebuilt.insert(records.into_iter().map(|r| (r.vector, r.chunk)).collect())?;
            Ok(Box::new(rebuilt))
        }
        VectorDriver::Sqlite => Err(VectorStoreError::Unsupported {
            backend: driver.name(),
            operation: "rebuild",
        }),
    }
}

/// Delete the on-disk snapshot of `driver`. Missing snapshots are fine.
pub fn remove_snapshot(driver: VectorDriver, root: &Path) -> Result<(), VectorStoreError> {
    let dir = snapshot_dir(driver, root);
    remove_path(&dir).map_err(|e| VectorStoreError::persistence(&dir, e))
}
