//! Vector storage
//!
//! This module provides:
//! - The record and result types shared by every backend
//! - A backend trait exposing the physical store operations
//! - The `VectorStore` handle that splits upserts into provider-sized
//!   sub-batches, validates dimensions and reports partial failures
//! - SQLite (embedded) and Qdrant (server) backends

mod qdrant;
mod sqlite;

pub use qdrant::*;
pub use sqlite::*;

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Similarity metric used to score a stored vector against a query.
/// Higher is always better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cosine,
    NegSquaredEuclidean,
}

impl Metric {
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::NegSquaredEuclidean => -a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::NegSquaredEuclidean => "neg_squared_euclidean",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Metric::Cosine),
            "neg_squared_euclidean" => Ok(Metric::NegSquaredEuclidean),
            _ => Err(Error::InvalidConfig(format!("Unknown metric: {}", s))),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Which storage engine backs the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Sqlite,
    Qdrant,
}

/// Payload kept next to each vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub source_id: Option<String>,
    pub chunk_text: Option<String>,
}

/// A stored unit: id, vector and payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, vector: Vec<f32>, metadata: RecordMetadata) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata,
        }
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// A record with its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub score: f32,
}

/// Matches ordered by score, highest first
pub type QueryResult = Vec<ScoredRecord>;

/// A sub-batch that could not be written
#[derive(Debug, Clone, Serialize)]
pub struct FailedBatch {
    /// Position of the sub-batch within the upsert
    pub index: usize,
    pub records: usize,
    pub error: String,
}

/// Outcome of one upsert call
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpsertReport {
    pub written: usize,
    pub batches_written: usize,
    /// Ids of records refused for a dimension mismatch
    pub rejected: Vec<String>,
    pub failed_batches: Vec<FailedBatch>,
}

impl UpsertReport {
    pub fn failed_records(&self) -> usize {
        self.failed_batches.iter().map(|b| b.records).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty() && self.failed_batches.is_empty()
    }
}

/// Physical operations a storage engine provides.
///
/// `write_batch` must be atomic per call and create the collection on first
/// write. Query results are ranked by score. The SQLite backend breaks ties
/// by first insertion; Qdrant has no insertion order and breaks them by
/// record id, which is only stable while the tied group fits in its
/// over-fetched window.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn metric(&self) -> Metric;

    async fn write_batch(&self, collection: &str, records: &[VectorRecord]) -> Result<()>;

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<QueryResult>;

    async fn count(&self, collection: &str) -> Result<usize>;

    /// Dimension of an existing collection, `None` if it has never been written
    async fn dimension(&self, collection: &str) -> Result<Option<usize>>;

    async fn collections(&self) -> Result<Vec<String>>;

    /// Returns whether the collection existed
    async fn delete_collection(&self, collection: &str) -> Result<bool>;
}

/// Store handle shared by ingestion and retrieval
pub struct VectorStore {
    backend: Box<dyn VectorBackend>,
    batch_limit: usize,
    write_retries: u32,
    /// Dimension of the active embedding model, used for new collections
    dimension: Option<usize>,
}

impl VectorStore {
    pub fn new(backend: Box<dyn VectorBackend>, batch_limit: usize, write_retries: u32) -> Result<Self> {
        if batch_limit == 0 {
            return Err(Error::InvalidConfig(
                "store batch limit must be positive".to_string(),
            ));
        }
        Ok(Self {
            backend,
            batch_limit,
            write_retries,
            dimension: None,
        })
    }

    /// Fix the dimension a new collection accepts. Without it, a new
    /// collection takes the dimension of the first record written.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn metric(&self) -> Metric {
        self.backend.metric()
    }

    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Insert or overwrite records, in sub-batches of at most the batch limit.
    ///
    /// Records whose dimension differs from the collection's are rejected
    /// individually. A failed sub-batch does not undo earlier ones and does
    /// not stop later ones.
    pub async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> Result<UpsertReport> {
        let mut report = UpsertReport::default();
        let Some(first) = records.first() else {
            return Ok(report);
        };

        let expected = match self.backend.dimension(collection).await? {
            Some(dim) => dim,
            None => self.dimension.unwrap_or_else(|| first.dimension()),
        };
        if expected == 0 {
            return Err(Error::InvalidConfig(
                "cannot store zero-length vectors".to_string(),
            ));
        }

        let mut accepted = Vec::with_capacity(records.len());
        let mut first_mismatch = None;
        for record in records {
            if record.dimension() == expected {
                accepted.push(record);
            } else {
                warn!(
                    "Rejecting record {}: dimension {} != {}",
                    record.id,
                    record.dimension(),
                    expected
                );
                first_mismatch.get_or_insert(record.dimension());
                report.rejected.push(record.id);
            }
        }

        if accepted.is_empty() {
            return Err(Error::DimensionMismatch {
                expected,
                actual: first_mismatch.unwrap_or(0),
            });
        }

        let total_batches = accepted.len().div_ceil(self.batch_limit);
        debug!(
            "Upserting {} records to {} in {} batch(es)",
            accepted.len(),
            collection,
            total_batches
        );

        for (index, batch) in accepted.chunks(self.batch_limit).enumerate() {
            match self.write_with_retry(collection, batch).await {
                Ok(()) => {
                    report.written += batch.len();
                    report.batches_written += 1;
                }
                Err(e) => {
                    warn!(
                        "Batch {}/{} ({} records) failed for {}: {}",
                        index + 1,
                        total_batches,
                        batch.len(),
                        collection,
                        e
                    );
                    report.failed_batches.push(FailedBatch {
                        index,
                        records: batch.len(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn write_with_retry(&self, collection: &str, batch: &[VectorRecord]) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.backend.write_batch(collection, batch).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.write_retries => {
                    attempt += 1;
                    debug!("Retrying batch write (attempt {}): {}", attempt, e);
                    tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Top-`k` records by similarity to `vector`.
    ///
    /// An unknown collection yields an empty result.
    pub async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Err(Error::InvalidConfig("k must be at least 1".to_string()));
        }

        let Some(dimension) = self.backend.dimension(collection).await? else {
            return Ok(Vec::new());
        };
        if vector.len() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }

        self.backend.query(collection, vector, k).await
    }

    pub async fn count(&self, collection: &str) -> Result<usize> {
        self.backend.count(collection).await
    }

    pub async fn dimension(&self, collection: &str) -> Result<Option<usize>> {
        self.backend.dimension(collection).await
    }

    pub async fn collections(&self) -> Result<Vec<String>> {
        self.backend.collections().await
    }

    pub async fn delete_collection(&self, collection: &str) -> Result<bool> {
        self.backend.delete_collection(collection).await
    }
}

/// Open the store described by the configuration
pub async fn open_store(config: &Config) -> Result<VectorStore> {
    let store = &config.store;
    let backend: Box<dyn VectorBackend> = match store.backend {
        StoreBackendKind::Sqlite => {
            let path = config.store_path();
            info!("Opening SQLite vector store at {}", path.display());
            Box::new(SqliteBackend::open(&path, store.metric).await?)
        }
        StoreBackendKind::Qdrant => {
            info!("Connecting to Qdrant at {}", store.url);
            Box::new(QdrantBackend::connect(&store.url, store.metric)?)
        }
    };
    Ok(VectorStore::new(backend, store.batch_limit, store.write_retries)?
        .with_dimension(config.embedding.resolved_dimension()))
}
