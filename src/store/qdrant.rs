//! Qdrant backend
//!
//! Record ids are arbitrary strings, Qdrant wants UUIDs: each id maps to a
//! v5 UUID and the original id travels in the payload.

use super::{Metric, QueryResult, RecordMetadata, ScoredRecord, VectorBackend, VectorRecord};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, GetCollectionInfoResponse, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

const RECORD_ID_KEY: &str = "record_id";
const SOURCE_ID_KEY: &str = "source_id";
const CHUNK_TEXT_KEY: &str = "chunk_text";
const UPDATED_AT_KEY: &str = "updated_at";

/// Extra hits fetched past `k` so ties at the cut are settled locally
const TIE_SLACK: usize = 16;

/// Qdrant server backend
pub struct QdrantBackend {
    client: Qdrant,
    metric: Metric,
}

impl QdrantBackend {
    /// Build a client for `url`. No request is made until first use.
    pub fn connect(url: &str, metric: Metric) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .skip_compatibility_check()
            .build()
            .map_err(|e| Error::StoreUnavailable(format!("qdrant: {}", e)))?;

        Ok(Self { client, metric })
    }

    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        if self.client.collection_exists(collection).await? {
            return Ok(());
        }

        info!(
            "Creating collection {} with dimension {} ({})",
            collection, dimension, self.metric
        );

        let vectors_config = VectorParamsBuilder::new(dimension as u64, distance_for(self.metric));
        self.client
            .create_collection(CreateCollectionBuilder::new(collection).vectors_config(vectors_config))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    async fn write_batch(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        self.ensure_collection(collection, first.dimension()).await?;

        let updated_at = Utc::now().to_rfc3339();
        let points: Vec<PointStruct> = records
            .iter()
            .map(|r| {
                PointStruct::new(
                    point_id(&r.id).to_string(),
                    r.vector.clone(),
                    to_payload(r, &updated_at),
                )
            })
            .collect();

        debug!("Upserting {} points to collection {}", points.len(), collection);

        // wait=true so the batch is visible to queries once this returns
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await?;
        Ok(())
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<QueryResult> {
        if !self.client.collection_exists(collection).await? {
            return Ok(Vec::new());
        }

        let limit = k.saturating_add(TIE_SLACK) as u64;
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector.to_vec(), limit).with_payload(true),
            )
            .await?;

        let results = response
            .result
            .into_iter()
            .map(|p| ScoredRecord {
                score: score_for(self.metric, p.score),
                record: from_payload(p.payload),
            })
            .collect();
        Ok(rank_hits(results, k))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        if !self.client.collection_exists(collection).await? {
            return Ok(0);
        }
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn dimension(&self, collection: &str) -> Result<Option<usize>> {
        if !self.client.collection_exists(collection).await? {
            return Ok(None);
        }
        let info = self.client.collection_info(collection).await?;
        Ok(vector_size(&info))
    }

    async fn collections(&self) -> Result<Vec<String>> {
        let response = self.client.list_collections().await?;
        let mut names: Vec<String> = response.collections.into_iter().map(|c| c.name).collect();
        names.sort();
        Ok(names)
    }

    async fn delete_collection(&self, collection: &str) -> Result<bool> {
        if !self.client.collection_exists(collection).await? {
            return Ok(false);
        }
        info!("Deleting collection {}", collection);
        self.client.delete_collection(collection).await?;
        Ok(true)
    }
}

fn distance_for(metric: Metric) -> Distance {
    match metric {
        Metric::Cosine => Distance::Cosine,
        Metric::NegSquaredEuclidean => Distance::Euclid,
    }
}

/// Qdrant reports plain Euclidean distance; convert to negated squared distance
fn score_for(metric: Metric, raw: f32) -> f32 {
    match metric {
        Metric::Cosine => raw,
        Metric::NegSquaredEuclidean => -(raw * raw),
    }
}

/// Stable point id for a record id
pub fn point_id(record_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes())
}

fn to_payload(record: &VectorRecord, updated_at: &str) -> HashMap<String, QdrantValue> {
    let mut map = HashMap::new();
    map.insert(RECORD_ID_KEY.to_string(), string_value(&record.id));
    map.insert(UPDATED_AT_KEY.to_string(), string_value(updated_at));
    if let Some(ref source_id) = record.metadata.source_id {
        map.insert(SOURCE_ID_KEY.to_string(), string_value(source_id));
    }
    if let Some(ref text) = record.metadata.chunk_text {
        map.insert(CHUNK_TEXT_KEY.to_string(), string_value(text));
    }
    map
}

/// Search hits carry payload only, so the returned record has no vector
fn from_payload(mut payload: HashMap<String, QdrantValue>) -> VectorRecord {
    let mut take = |key: &str| payload.remove(key).and_then(string_of);
    VectorRecord {
        id: take(RECORD_ID_KEY).unwrap_or_default(),
        vector: Vec::new(),
        metadata: RecordMetadata {
            source_id: take(SOURCE_ID_KEY),
            chunk_text: take(CHUNK_TEXT_KEY),
        },
    }
}

fn string_value(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(Kind::StringValue(s.to_string())),
    }
}

fn string_of(value: QdrantValue) -> Option<String> {
    match value.kind {
        Some(Kind::StringValue(s)) => Some(s),
        _ => None,
    }
}

fn vector_size(info: &GetCollectionInfoResponse) -> Option<usize> {
    let result = info.result.as_ref()?;
    let config = result.config.as_ref()?;
    let params = config.params.as_ref()?;
    let vectors_config = params.vectors_config.as_ref()?;

    match vectors_config.config.as_ref()? {
        qdrant_client::qdrant::vectors_config::Config::Params(params) => Some(params.size as usize),
        // Named vectors are not written by this backend
        qdrant_client::qdrant::vectors_config::Config::ParamsMap(_) => None,
    }
}

/// Order hits by score, then record id, and keep the top `k`.
///
/// Qdrant leaves tie order unspecified. Ties are deterministic as long as the
/// tied group fits in the over-fetched window.
fn rank_hits(mut hits: QueryResult, k: usize) -> QueryResult {
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    hits.truncate(k);
    hits
}
