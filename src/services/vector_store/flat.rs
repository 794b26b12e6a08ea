//! Append-only brute-force index persisted as a JSON snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{IndexRecord, RecordId, VectorBackend, check_dimension};
use crate::error::VectorStoreError;
use crate::models::{Chunk, ScoredChunk, VectorDriver};
use crate::utils::write_atomic;

const SNAPSHOT_FILE: &str = "index.json";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    dimension: usize,
    next_id: u64,
    records: Vec<SnapshotRecord>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotRecord {
    id: u64,
    /// Little-endian f32 bytes, hex encoded.
    vector: String,
    chunk: Chunk,
}

/// Exhaustive squared-L2 index. Records can be appended but not removed;
/// dropping records means building a new index from the survivors.
pub struct FlatIndex {
    path: PathBuf,
    dimension: usize,
    ids: Vec<u64>,
    /// Row-major, `ids.len() * dimension` values.
    vectors: Vec<f32>,
    chunks: Vec<Chunk>,
    next_id: u64,
}

impl FlatIndex {
    pub fn new(dir: &Path, dimension: usize) -> Self {
        Self {
            path: dir.join(SNAPSHOT_FILE),
            dimension,
            ids: Vec::new(),
            vectors: Vec::new(),
            chunks: Vec::new(),
            next_id: 0,
        }
    }

    pub fn load(dir: &Path) -> Result<Option<Self>, VectorStoreError> {
        let path = dir.join(SNAPSHOT_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path).map_err(|e| VectorStoreError::persistence(&path, e))?;
        let snapshot: Snapshot = serde_json::from_slice(&data)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(VectorStoreError::CorruptSnapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut index = Self::new(dir, snapshot.dimension);
        index.next_id = snapshot.next_id;

        for record in snapshot.records {
            let vector = decode_vector(&record.vector)?;
            check_dimension(snapshot.dimension, &vector)
                .map_err(|e| VectorStoreError::CorruptSnapshot(e.to_string()))?;
            index.ids.push(record.id);
            index.vectors.extend(vector);
            index.chunks.push(record.chunk);
        }

        debug!("loaded {} records from {}", index.ids.len(), path.display());
        Ok(Some(index))
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.vectors[start..start + self.dimension]
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn encode_vector(vector: &[f32]) -> String {
    let bytes: Vec<u8> = vector.iter().flat_map(|v| v.to_le_bytes()).collect();
    hex::encode(bytes)
}

fn decode_vector(encoded: &str) -> Result<Vec<f32>, VectorStoreError> {
    let bytes = hex::decode(encoded)
        .map_err(|e| VectorStoreError::CorruptSnapshot(format!("bad vector encoding: {}", e)))?;
    if bytes.len() % 4 != 0 {
        return Err(VectorStoreError::CorruptSnapshot(
            "vector byte length is not a multiple of 4".to_string(),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

impl VectorBackend for FlatIndex {
    fn kind(&self) -> VectorDriver {
        VectorDriver::Flat
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> Result<usize, VectorStoreError> {
        Ok(self.ids.len())
    }

    fn insert(&mut self, entries: Vec<(Vec<f32>, Chunk)>) -> Result<Vec<RecordId>, VectorStoreError> {
        for (vector, _) in &entries {
            check_dimension(self.dimension, vector)?;
        }

        let mut assigned = Vec::with_capacity(entries.len());
        for (vector, chunk) in entries {
            let id = self.next_id;
            self.next_id += 1;
            self.ids.push(id);
            self.vectors.extend(vector);
            self.chunks.push(chunk);
            assigned.push(RecordId::new(id));
        }
        Ok(assigned)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        check_dimension(self.dimension, query)?;

        let mut scored: Vec<(usize, f32)> = (0..self.ids.len())
            .map(|pos| (pos, squared_l2(self.row(pos), query)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(pos, distance)| ScoredChunk {
                chunk: self.chunks[pos].clone(),
                distance,
            })
            .collect())
    }

    fn records(&self) -> Result<Vec<IndexRecord>, VectorStoreError> {
        Ok((0..self.ids.len())
            .map(|pos| IndexRecord {
                id: RecordId::new(self.ids[pos]),
                vector: self.row(pos).to_vec(),
                chunk: self.chunks[pos].clone(),
            })
            .collect())
    }

    fn supports_removal(&self) -> bool {
        false
    }

    fn delete_ids(&mut self, _ids: &[RecordId]) -> Result<usize, VectorStoreError> {
        Err(VectorStoreError::Unsupported {
            backend: "flat",
            operation: "delete",
        })
    }

    fn persist(&self) -> Result<(), VectorStoreError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            dimension: self.dimension,
            next_id: self.next_id,
            records: (0..self.ids.len())
                .map(|pos| SnapshotRecord {
                    id: self.ids[pos],
                    vector: encode_vector(self.row(pos)),
                    chunk: self.chunks[pos].clone(),
                })
                .collect(),
        };

        let data = serde_json::to_vec(&snapshot)?;
        write_atomic(&self.path, &data).map_err(|e| VectorStoreError::persistence(&self.path, e))?;
        debug!("persisted {} records to {}", self.ids.len(), self.path.display());
        Ok(())
    }
}
