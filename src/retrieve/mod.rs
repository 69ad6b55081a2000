//! Top-k retrieval: embed the query, then ask the store for its neighbours

use crate::config::Config;
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::store::{QueryResult, ScoredRecord, VectorStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A retrieved chunk as handed to context assembly and printed by the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub source_id: Option<String>,
    pub text: String,
    pub score: f32,
}

impl From<ScoredRecord> for RetrievedChunk {
    fn from(scored: ScoredRecord) -> Self {
        Self {
            id: scored.record.id,
            source_id: scored.record.metadata.source_id,
            text: scored.record.metadata.chunk_text.unwrap_or_default(),
            score: scored.score,
        }
    }
}

/// Read-only query path over one collection
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
    collection: String,
    default_k: usize,
    max_k: usize,
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<VectorStore>,
        collection: impl Into<String>,
        default_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
            default_k,
            max_k: usize::MAX,
            min_score: None,
        }
    }

    pub fn from_config(config: &Config, embedder: Arc<dyn Embedder>, store: Arc<VectorStore>) -> Self {
        Self::new(embedder, store, &config.store.collection, config.query.default_k)
            .with_max_k(config.query.max_k)
            .with_min_score(config.query.min_score)
    }

    pub fn with_max_k(mut self, max_k: usize) -> Self {
        self.max_k = max_k;
        self
    }

    /// Drop matches scoring below the threshold (applied after ranking)
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The `k` records most similar to `query`, best first
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<QueryResult> {
        if query.trim().is_empty() {
            return Err(Error::InvalidConfig("query must not be empty".to_string()));
        }
        if k == 0 {
            return Err(Error::InvalidConfig("k must be at least 1".to_string()));
        }
        if k > self.max_k {
            return Err(Error::InvalidConfig(format!(
                "k = {} exceeds the maximum of {}",
                k, self.max_k
            )));
        }

        let query_vector = self
            .embedder
            .embed(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("No embedding returned for query".to_string()))?;

        let mut results = self.store.query(&self.collection, &query_vector, k).await?;
        debug!("Retrieved {} records from {}", results.len(), self.collection);

        if let Some(min) = self.min_score {
            results.retain(|r| r.score >= min);
        }
        Ok(results)
    }

    pub async fn retrieve_default(&self, query: &str) -> Result<QueryResult> {
        self.retrieve(query, self.default_k).await
    }

    /// Like [`retrieve`](Self::retrieve), flattened for display and context assembly
    pub async fn retrieve_chunks(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        Ok(self
            .retrieve(query, k)
            .await?
            .into_iter()
            .map(RetrievedChunk::from)
            .collect())
    }
}
