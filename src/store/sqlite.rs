//! Embedded SQLite backend
//!
//! Vectors are stored as little-endian f32 blobs and scored by a full scan,
//! which is adequate for corpora up to a few hundred thousand chunks.

use super::{Metric, QueryResult, RecordMetadata, ScoredRecord, VectorBackend, VectorRecord};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::FromRow;
use std::path::Path;
use tracing::debug;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    dimension INTEGER NOT NULL,
    metric TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL REFERENCES collections(name),
    id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    vector BLOB NOT NULL,
    source_id TEXT,
    chunk_text TEXT,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_records_seq ON records(collection, seq);
"#;

#[derive(Debug, FromRow)]
struct RecordRow {
    id: String,
    vector: Vec<u8>,
    source_id: Option<String>,
    chunk_text: Option<String>,
}

#[derive(Debug, FromRow)]
struct CollectionRow {
    dimension: i64,
    metric: String,
}

/// Vector store kept in a single SQLite file (WAL mode)
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    metric: Metric,
}

impl SqliteBackend {
    /// Open or create the database at `path`.
    /// `metric` applies to collections created through this handle.
    pub async fn open(path: &Path, metric: Metric) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreUnavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        debug!("Connecting to SQLite vector store at {:?}", path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("{}: {}", path.display(), e)))?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self { pool, metric })
    }

    async fn collection(&self, name: &str) -> Result<Option<CollectionRow>> {
        let row = sqlx::query_as::<_, CollectionRow>(
            "SELECT dimension, metric FROM collections WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl VectorBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    async fn write_batch(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let dimension = first.dimension();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO collections (name, dimension, metric, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(dimension as i64)
        .bind(self.metric.as_str())
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let stored: i64 = sqlx::query_scalar("SELECT dimension FROM collections WHERE name = ?")
            .bind(collection)
            .fetch_one(&mut *tx)
            .await?;
        if let Some(bad) = records.iter().find(|r| r.dimension() as i64 != stored) {
            return Err(Error::DimensionMismatch {
                expected: stored as usize,
                actual: bad.dimension(),
            });
        }

        let base: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) FROM records WHERE collection = ?")
            .bind(collection)
            .fetch_one(&mut *tx)
            .await?;

        for (offset, record) in records.iter().enumerate() {
            // seq is only assigned on first insert
            sqlx::query(
                r#"
                INSERT INTO records (collection, id, seq, vector, source_id, chunk_text, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    vector = excluded.vector,
                    source_id = excluded.source_id,
                    chunk_text = excluded.chunk_text,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(collection)
            .bind(&record.id)
            .bind(base + offset as i64 + 1)
            .bind(encode_vector(&record.vector))
            .bind(&record.metadata.source_id)
            .bind(&record.metadata.chunk_text)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Wrote {} records to {}", records.len(), collection);
        Ok(())
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<QueryResult> {
        let Some(info) = self.collection(collection).await? else {
            return Ok(Vec::new());
        };
        let metric: Metric = info.metric.parse()?;
        let dimension = info.dimension as usize;

        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT id, vector, source_id, chunk_text FROM records WHERE collection = ? ORDER BY seq",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let stored = decode_vector(&row.vector, dimension)?;
            scored.push(ScoredRecord {
                score: metric.score(&stored, vector),
                record: VectorRecord {
                    id: row.id,
                    vector: stored,
                    metadata: RecordMetadata {
                        source_id: row.source_id,
                        chunk_text: row.chunk_text,
                    },
                },
            });
        }

        // Stable: rows arrive in insertion order, so ties keep it
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn dimension(&self, collection: &str) -> Result<Option<usize>> {
        Ok(self
            .collection(collection)
            .await?
            .map(|c| c.dimension as usize))
    }

    async fn collections(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>("SELECT name FROM collections ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(collection)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_vector(blob: &[u8], dimension: usize) -> Result<Vec<f32>> {
    let expected_len = dimension * std::mem::size_of::<f32>();
    if blob.len() != expected_len {
        return Err(Error::StoreUnavailable(format!(
            "corrupt vector blob: expected {} bytes, got {}",
            expected_len,
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
