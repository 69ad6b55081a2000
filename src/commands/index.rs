//! Index command: upsert a saved embedding artifact into the store

use crate::artifact::EmbeddingArtifact;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{RecordMetadata, UpsertReport, VectorRecord, VectorStore};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub collection: String,
    pub prefix: String,
    pub records: usize,
    pub report: UpsertReport,
}

/// Id prefix used when none is given: the artifact's file stem
pub fn default_prefix(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::InvalidConfig(format!("Cannot derive an id prefix from {}", path.display()))
        })
}

/// Load an artifact and upsert it with ids `{prefix}_{i}`
pub async fn cmd_index_artifact(
    config: &Config,
    store: &VectorStore,
    path: &Path,
    prefix: Option<String>,
) -> Result<IndexSummary> {
    let prefix = match prefix {
        Some(p) => p,
        None => default_prefix(path)?,
    };
    let artifact = EmbeddingArtifact::load(path)?;
    let collection = config.store.collection.clone();
    info!(
        "Indexing {} embeddings ({}, dim {}) from {} into '{}'",
        artifact.len(),
        artifact.model,
        artifact.dimension,
        path.display(),
        collection
    );

    let records: Vec<VectorRecord> = artifact
        .embeddings
        .into_iter()
        .zip(artifact.metadata)
        .enumerate()
        .map(|(i, (vector, entry))| {
            VectorRecord::new(
                format!("{}_{}", prefix, i),
                vector,
                RecordMetadata {
                    source_id: Some(entry.source),
                    chunk_text: Some(entry.chunk),
                },
            )
        })
        .collect();
    let total = records.len();

    let report = store.upsert(&collection, records).await?;
    for failed in &report.failed_batches {
        warn!(
            "Sub-batch {} ({} records) failed: {}",
            failed.index, failed.records, failed.error
        );
    }

    Ok(IndexSummary {
        collection,
        prefix,
        records: total,
        report,
    })
}

pub fn print_index_summary(summary: &IndexSummary) {
    let report = &summary.report;
    println!("\n✓ Indexed into '{}'", summary.collection);
    println!("  Records: {}", summary.records);
    println!(
        "  Written: {} ({} batches)",
        report.written, report.batches_written
    );
    if !report.rejected.is_empty() {
        println!("  Rejected (dimension mismatch): {}", report.rejected.len());
    }
    for failed in &report.failed_batches {
        println!(
            "  Failed batch {}: {} records ({})",
            failed.index, failed.records, failed.error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactEntry;
    use crate::store::{Metric, SqliteBackend};
    use tempfile::TempDir;

    fn artifact(n: usize) -> EmbeddingArtifact {
        let mut artifact = EmbeddingArtifact::new("m", 2);
        for i in 0..n {
            artifact.push(
                vec![1.0, i as f32],
                ArtifactEntry {
                    source: "law.txt".to_string(),
                    chunk: format!("chunk {}", i),
                },
            );
        }
        artifact
    }

    #[tokio::test]
    async fn test_index_uses_prefix_ids_and_sub_batches() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("legal.json");
        artifact(5).save(&path).unwrap();

        let backend = SqliteBackend::open(&tmp.path().join("store.db"), Metric::Cosine)
            .await
            .unwrap();
        let store = VectorStore::new(Box::new(backend), 2, 0).unwrap();
        let config = Config::default();

        let summary = cmd_index_artifact(&config, &store, &path, None).await.unwrap();

        assert_eq!(summary.prefix, "legal");
        assert_eq!(summary.records, 5);
        assert_eq!(summary.report.written, 5);
        assert_eq!(summary.report.batches_written, 3);

        let hits = store
            .query(&config.store.collection, &[1.0, 4.0], 1)
            .await
            .unwrap();
        assert_eq!(hits[0].record.id, "legal_4");
        assert_eq!(hits[0].record.metadata.chunk_text.as_deref(), Some("chunk 4"));
    }

    #[tokio::test]
    async fn test_index_rejects_malformed_artifact() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{}").unwrap();

        let backend = SqliteBackend::open(&tmp.path().join("store.db"), Metric::Cosine)
            .await
            .unwrap();
        let store = VectorStore::new(Box::new(backend), 10, 0).unwrap();

        let err = cmd_index_artifact(&Config::default(), &store, &path, Some("x".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArtifact(_)));
    }
}
