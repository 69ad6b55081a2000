//! Embed command: compute embeddings for a directory and save them as an
//! artifact for later indexing

use crate::artifact::{ArtifactEntry, EmbeddingArtifact};
use crate::chunk::Chunker;
use crate::commands::ingest::embed_document;
use crate::config::Config;
use crate::document::load_dir;
use crate::embed::Embedder;
use crate::error::Result;
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct EmbedSummary {
    pub documents: usize,
    pub embeddings: usize,
    pub model: String,
    pub dimension: usize,
    pub output: PathBuf,
}

/// Embed every matching file under `dir` and write the artifact to `out`.
///
/// Unlike ingestion, any failure aborts: an artifact is all or nothing.
pub async fn cmd_embed_dir(
    config: &Config,
    embedder: &dyn Embedder,
    dir: &Path,
    out: &Path,
) -> Result<EmbedSummary> {
    let chunker = Chunker::from_config(&config.chunk)?;
    let documents = load_dir(dir, &config.ingest.extensions)?;
    let batch_size = config.embedding.batch_size;
    info!("Embedding {} documents from {}", documents.len(), dir.display());

    let pb = start_progress_bar(documents.len(), "Embedding documents");
    let chunker = &chunker;
    let pb_ref = &pb;

    let embedded: Vec<_> = stream::iter(documents.iter())
        .map(|doc| async move {
            let result = embed_document(chunker, embedder, batch_size, doc).await;
            advance_progress(pb_ref);
            result
        })
        .buffered(config.ingest.concurrency.max(1))
        .try_collect()
        .await?;

    finish_progress(pb, "Embedding complete");

    let mut artifact = EmbeddingArtifact::new(embedder.model_name(), embedder.dimension());
    for doc in embedded {
        for (chunk, embedding) in doc.chunks.into_iter().zip(doc.embeddings) {
            artifact.push(
                embedding,
                ArtifactEntry {
                    source: doc.source_id.clone(),
                    chunk: chunk.text,
                },
            );
        }
    }
    artifact.save(out)?;

    Ok(EmbedSummary {
        documents: documents.len(),
        embeddings: artifact.len(),
        model: artifact.model,
        dimension: artifact.dimension,
        output: out.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashingEmbedder;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_embed_dir_writes_artifact() {
        let tmp = TempDir::new().unwrap();
        let corpus = tmp.path().join("corpus");
        std::fs::create_dir_all(&corpus).unwrap();
        std::fs::write(corpus.join("a.txt"), "Offer and acceptance.").unwrap();
        std::fs::write(corpus.join("b.txt"), "Bail is the rule.").unwrap();

        let embedder = HashingEmbedder::new("hash", 16).unwrap();
        let out = tmp.path().join("artifacts/embeddings.json");
        let summary = cmd_embed_dir(&Config::default(), &embedder, &corpus, &out)
            .await
            .unwrap();

        assert_eq!(summary.documents, 2);
        assert_eq!(summary.embeddings, 2);

        let artifact = EmbeddingArtifact::load(&out).unwrap();
        assert_eq!(artifact.dimension, 16);
        assert_eq!(artifact.metadata[0].source, "a.txt");
        assert_eq!(artifact.metadata[1].chunk, "Bail is the rule.");
        assert_eq!(artifact.embeddings[1], embedder.embed_one("Bail is the rule."));
    }
}
