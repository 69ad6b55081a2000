//! Ingest command implementation

use crate::chunk::{Chunk, Chunker};
use crate::config::Config;
use crate::document::{load_dir, Document};
use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use crate::store::{RecordMetadata, VectorRecord, VectorStore};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Statistics from an ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    pub documents_seen: usize,
    pub documents_failed: usize,
    pub chunks_created: usize,
    pub records_written: usize,
    /// Records lost in sub-batches that could not be written
    pub records_failed: usize,
    /// Records refused for a dimension mismatch
    pub records_rejected: usize,
    pub batches_written: usize,
    pub batches_failed: usize,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for IngestStats {
    fn default() -> Self {
        Self {
            documents_seen: 0,
            documents_failed: 0,
            chunks_created: 0,
            records_written: 0,
            records_failed: 0,
            records_rejected: 0,
            batches_written: 0,
            batches_failed: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

impl IngestStats {
    fn record_failure(&mut self, source_id: &str, error: impl std::fmt::Display) {
        warn!("Failed to ingest {}: {}", source_id, error);
        self.documents_failed += 1;
        self.errors.push(format!("{}: {}", source_id, error));
    }

    /// Whether every chunk of every document reached the store
    pub fn is_complete(&self) -> bool {
        self.documents_failed == 0
    }
}

/// Chunks of one document paired with their embeddings
pub(crate) struct EmbeddedDocument {
    pub source_id: String,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<Vec<f32>>,
}

/// Normalize, split and embed one document
pub(crate) async fn embed_document(
    chunker: &Chunker,
    embedder: &dyn Embedder,
    batch_size: usize,
    doc: &Document,
) -> Result<EmbeddedDocument> {
    let chunks = chunker.chunk_document(doc)?;
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embed_in_batches(embedder, texts, batch_size).await?;

    if embeddings.len() != chunks.len() {
        return Err(Error::Embedding(format!(
            "{} embeddings for {} chunks",
            embeddings.len(),
            chunks.len()
        )));
    }

    debug!("Embedded {} ({} chunks)", doc.source_id, chunks.len());
    Ok(EmbeddedDocument {
        source_id: doc.source_id.clone(),
        chunks,
        embeddings,
    })
}

impl EmbeddedDocument {
    /// Store records keyed `{source_id}_{index}`
    pub fn into_records(self) -> Vec<VectorRecord> {
        self.chunks
            .into_iter()
            .zip(self.embeddings)
            .map(|(chunk, vector)| {
                VectorRecord::new(
                    chunk.record_id(),
                    vector,
                    RecordMetadata {
                        source_id: Some(chunk.source_id),
                        chunk_text: Some(chunk.text),
                    },
                )
            })
            .collect()
    }
}

/// Chunk, embed and upsert a corpus into the configured collection.
///
/// Chunking and embedding run for up to `ingest.concurrency` documents at a
/// time; upserts happen in document order. A failing document is logged and
/// counted, and the run continues with the next one.
pub async fn ingest_documents<I>(
    config: &Config,
    embedder: &dyn Embedder,
    store: &VectorStore,
    documents: I,
) -> Result<IngestStats>
where
    I: IntoIterator<Item = Document>,
{
    let chunker = Chunker::from_config(&config.chunk)?;
    let documents: Vec<Document> = documents.into_iter().collect();
    let collection = config.store.collection.as_str();
    let batch_size = config.embedding.batch_size;

    let mut stats = IngestStats::default();
    info!(
        "Ingesting {} documents into '{}' ({} backend)",
        documents.len(),
        collection,
        store.backend_name()
    );

    let pb = start_progress_bar(documents.len(), "Ingesting documents");
    let chunker = &chunker;

    let mut prepared = stream::iter(documents.iter())
        .map(|doc| async move {
            let outcome = embed_document(chunker, embedder, batch_size, doc).await;
            (doc.source_id.as_str(), outcome)
        })
        .buffered(config.ingest.concurrency.max(1));

    while let Some((source_id, outcome)) = prepared.next().await {
        stats.documents_seen += 1;
        advance_progress(&pb);

        let embedded = match outcome {
            Ok(embedded) => embedded,
            Err(e) => {
                stats.record_failure(source_id, e);
                continue;
            }
        };

        if embedded.chunks.is_empty() {
            debug!("{} produced no chunks", source_id);
            continue;
        }
        stats.chunks_created += embedded.chunks.len();

        match store.upsert(collection, embedded.into_records()).await {
            Ok(report) => {
                stats.records_written += report.written;
                stats.batches_written += report.batches_written;
                stats.records_rejected += report.rejected.len();
                stats.records_failed += report.failed_records();
                stats.batches_failed += report.failed_batches.len();

                if !report.is_complete() {
                    let reason = report
                        .failed_batches
                        .first()
                        .map(|b| b.error.clone())
                        .unwrap_or_else(|| {
                            format!("{} records rejected", report.rejected.len())
                        });
                    stats.record_failure(source_id, reason);
                }
            }
            Err(e) => stats.record_failure(source_id, e),
        }
    }

    finish_progress(pb, "Ingestion complete");
    stats.completed_at = Some(Utc::now());

    info!(
        "Ingested {} documents: {} chunks, {} records written, {} failed documents",
        stats.documents_seen, stats.chunks_created, stats.records_written, stats.documents_failed
    );
    Ok(stats)
}

/// Ingest every matching file under `path`
pub async fn cmd_ingest_dir(
    config: &Config,
    embedder: &dyn Embedder,
    store: &VectorStore,
    path: &Path,
) -> Result<IngestStats> {
    // Reject bad chunk settings before walking the tree
    Chunker::from_config(&config.chunk)?;

    info!("Loading documents from {}", path.display());
    let documents = load_dir(path, &config.ingest.extensions)?;
    if documents.is_empty() {
        warn!("No documents found under {}", path.display());
    }

    ingest_documents(config, embedder, store, documents).await
}

/// Print ingestion stats to console
pub fn print_ingest_stats(stats: &IngestStats) {
    println!("\n✓ Ingestion complete");
    println!("  Documents processed: {}", stats.documents_seen);
    println!("  Documents failed: {}", stats.documents_failed);
    println!("  Chunks created: {}", stats.chunks_created);
    println!(
        "  Records written: {} ({} batches)",
        stats.records_written, stats.batches_written
    );
    if stats.records_rejected > 0 {
        println!("  Records rejected: {}", stats.records_rejected);
    }
    if stats.batches_failed > 0 {
        println!(
            "  Failed batches: {} ({} records)",
            stats.batches_failed, stats.records_failed
        );
    }
    if let Some(completed) = stats.completed_at {
        let elapsed = completed - stats.started_at;
        println!("  Elapsed: {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
    }

    if !stats.errors.is_empty() {
        println!("\nErrors:");
        for error in &stats.errors {
            println!("  - {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashingEmbedder;
    use crate::store::{Metric, SqliteBackend};
    use async_trait::async_trait;
    use tempfile::TempDir;

    async fn sqlite_store(tmp: &TempDir) -> VectorStore {
        let backend = SqliteBackend::open(&tmp.path().join("store.db"), Metric::Cosine)
            .await
            .unwrap();
        VectorStore::new(Box::new(backend), 5000, 0).unwrap()
    }

    fn small_chunks() -> Config {
        let mut config = Config::default();
        config.chunk.max_chars = 40;
        config.chunk.overlap_chars = 0;
        config.chunk.normalizer = "none".to_string();
        config
    }

    /// Fails any batch that contains the word "poison"
    struct PoisonEmbedder(HashingEmbedder);

    #[async_trait]
    impl Embedder for PoisonEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            if texts.iter().any(|t| t.contains("poison")) {
                return Err(Error::Embedding("backend refused input".to_string()));
            }
            self.0.embed(texts).await
        }

        fn dimension(&self) -> usize {
            self.0.dimension()
        }

        fn model_name(&self) -> &str {
            "poison"
        }
    }

    #[tokio::test]
    async fn test_ingest_writes_one_record_per_chunk() {
        let tmp = TempDir::new().unwrap();
        let store = sqlite_store(&tmp).await;
        let embedder = HashingEmbedder::new("hash", 64).unwrap();
        let config = small_chunks();

        let docs = vec![
            Document::new("act", "Every contract needs consideration. Offers may be revoked."),
            Document::new("order", "Bail is the rule."),
        ];
        let stats = ingest_documents(&config, &embedder, &store, docs).await.unwrap();

        assert_eq!(stats.documents_seen, 2);
        assert_eq!(stats.documents_failed, 0);
        assert!(stats.chunks_created >= 3);
        assert_eq!(stats.records_written, stats.chunks_created);
        assert!(stats.completed_at.is_some());
        assert_eq!(
            store.count(&config.store.collection).await.unwrap(),
            stats.chunks_created
        );
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = sqlite_store(&tmp).await;
        let embedder = HashingEmbedder::new("hash", 64).unwrap();
        let config = small_chunks();
        let docs = vec![Document::new("act", "Every contract needs consideration.")];

        let first = ingest_documents(&config, &embedder, &store, docs.clone()).await.unwrap();
        let second = ingest_documents(&config, &embedder, &store, docs).await.unwrap();

        assert_eq!(first.chunks_created, second.chunks_created);
        assert_eq!(
            store.count(&config.store.collection).await.unwrap(),
            first.chunks_created
        );
    }

    #[tokio::test]
    async fn test_failing_document_does_not_stop_the_run() {
        let tmp = TempDir::new().unwrap();
        let store = sqlite_store(&tmp).await;
        let embedder = PoisonEmbedder(HashingEmbedder::new("hash", 64).unwrap());
        let config = small_chunks();

        let docs = vec![
            Document::new("a", "Clean text."),
            Document::new("b", "This one is poison."),
            Document::new("c", "More clean text."),
        ];
        let stats = ingest_documents(&config, &embedder, &store, docs).await.unwrap();

        assert_eq!(stats.documents_seen, 3);
        assert_eq!(stats.documents_failed, 1);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].starts_with("b:"));
        assert_eq!(store.count(&config.store.collection).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_chunk_config_fails_before_io() {
        let tmp = TempDir::new().unwrap();
        let store = sqlite_store(&tmp).await;
        let embedder = HashingEmbedder::new("hash", 64).unwrap();
        let mut config = small_chunks();
        config.chunk.overlap_chars = config.chunk.max_chars;

        let err = ingest_documents(&config, &embedder, &store, vec![Document::new("a", "text")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(store.collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_document_produces_no_records() {
        let tmp = TempDir::new().unwrap();
        let store = sqlite_store(&tmp).await;
        let embedder = HashingEmbedder::new("hash", 64).unwrap();
        let config = small_chunks();

        let stats = ingest_documents(&config, &embedder, &store, vec![Document::new("blank", "")])
            .await
            .unwrap();

        assert_eq!(stats.documents_seen, 1);
        assert_eq!(stats.chunks_created, 0);
        assert_eq!(stats.records_written, 0);
    }

    #[tokio::test]
    async fn test_ingest_dir_uses_relative_paths_as_ids() {
        let tmp = TempDir::new().unwrap();
        let corpus = tmp.path().join("corpus");
        std::fs::create_dir_all(corpus.join("acts")).unwrap();
        std::fs::write(corpus.join("acts/contract.txt"), "Offer and acceptance.").unwrap();
        std::fs::write(corpus.join("notes.md"), "Bail is the rule.").unwrap();

        let store = sqlite_store(&tmp).await;
        let embedder = HashingEmbedder::new("hash", 64).unwrap();
        let config = small_chunks();

        let stats = cmd_ingest_dir(&config, &embedder, &store, &corpus).await.unwrap();
        assert_eq!(stats.documents_seen, 2);

        let query = embedder.embed_one("Offer and acceptance.");
        let hits = store.query(&config.store.collection, &query, 1).await.unwrap();
        assert_eq!(hits[0].record.id, "acts/contract.txt_0");
    }
}
