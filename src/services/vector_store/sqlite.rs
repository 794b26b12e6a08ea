//! SQLite-backed index with native per-record deletion.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{IndexRecord, RecordId, VectorBackend, check_dimension};
use crate::error::VectorStoreError;
use crate::models::{Chunk, ChunkMetadata, ScoredChunk, VectorDriver};

const DB_FILE: &str = "index.sqlite3";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    vector BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_source ON records(source);
"#;

/// Index stored in a single SQLite database; search is an exhaustive cosine
/// scan over the stored vectors.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    dimension: usize,
}

impl SqliteIndex {
    /// Create a new database for vectors of `dimension`.
    pub fn create(dir: &Path, dimension: usize) -> Result<Self, VectorStoreError> {
        std::fs::create_dir_all(dir).map_err(|e| VectorStoreError::persistence(dir, e))?;

        let conn = open_connection(&dir.join(DB_FILE))?;
        conn.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES ('dimension', ?1)",
            params![dimension.to_string()],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }

    /// Open an existing database, or `None` if there is none.
    pub fn open(dir: &Path) -> Result<Option<Self>, VectorStoreError> {
        let path = dir.join(DB_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let conn = open_connection(&path)?;
        let dimension: Option<String> = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = 'dimension'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let dimension = dimension
            .and_then(|d| d.parse::<usize>().ok())
            .ok_or_else(|| {
                VectorStoreError::CorruptSnapshot(format!(
                    "{} has no valid dimension",
                    path.display()
                ))
            })?;

        debug!("opened sqlite index at {} (dimension {})", path.display(), dimension);
        Ok(Some(Self {
            conn: Mutex::new(conn),
            dimension,
        }))
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn open_connection(path: &Path) -> Result<Connection, VectorStoreError> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

impl VectorBackend for SqliteIndex {
    fn kind(&self) -> VectorDriver {
        VectorDriver::Sqlite
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> Result<usize, VectorStoreError> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn insert(&mut self, entries: Vec<(Vec<f32>, Chunk)>) -> Result<Vec<RecordId>, VectorStoreError> {
        for (vector, _) in &entries {
            check_dimension(self.dimension, vector)?;
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut assigned = Vec::with_capacity(entries.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (source, content, metadata, vector) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (vector, chunk) in &entries {
                let metadata = serde_json::to_string(&chunk.metadata)?;
                stmt.execute(params![
                    chunk.metadata.source,
                    chunk.text,
                    metadata,
                    vector_to_blob(vector)
                ])?;
                assigned.push(RecordId::new(tx.last_insert_rowid() as u64));
            }
        }
        tx.commit()?;
        Ok(assigned)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        check_dimension(self.dimension, query)?;

        let mut scored: Vec<ScoredChunk> = self
            .records()?
            .into_iter()
            .map(|record| ScoredChunk {
                distance: cosine_distance(&record.vector, query),
                chunk: record.chunk,
            })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        Ok(scored)
    }

    fn records(&self) -> Result<Vec<IndexRecord>, VectorStoreError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, content, metadata, vector FROM records ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, content, metadata, blob) = row?;
            let metadata: ChunkMetadata = serde_json::from_str(&metadata)?;
            let vector = blob_to_vector(&blob);
            check_dimension(self.dimension, &vector)
                .map_err(|e| VectorStoreError::CorruptSnapshot(e.to_string()))?;
            records.push(IndexRecord {
                id: RecordId::new(id as u64),
                vector,
                chunk: Chunk::new(content, metadata),
            });
        }
        Ok(records)
    }

    fn supports_removal(&self) -> bool {
        true
    }

    fn delete_ids(&mut self, ids: &[RecordId]) -> Result<usize, VectorStoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM records WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id.raw() as i64])?;
            }
        }
        tx.commit()?;
        debug!("deleted {} records", deleted);
        Ok(deleted)
    }

    fn persist(&self) -> Result<(), VectorStoreError> {
        // Fold the WAL into the main database file.
        self.conn()
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }

    fn ids_for_source(&self, source: &str) -> Result<Vec<RecordId>, VectorStoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM records WHERE source = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![source], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(|id| RecordId::new(id as u64)).collect())
    }

    fn sources(&self) -> Result<Vec<String>, VectorStoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT DISTINCT source FROM records ORDER BY source")?;
        let sources = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }
}
