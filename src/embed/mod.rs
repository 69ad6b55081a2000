//! Embedding generation
//!
//! This module provides an abstraction over embedding models with:
//! - A trait for different embedding backends
//! - HTTP embedding backend
//! - Deterministic hashing backend for offline use
//! - Optional local FastEmbed backend (`local-embed` feature)
//! - Batch processing for efficiency

#[cfg(feature = "local-embed")]
mod fastembed_impl;
mod hashing;
mod http_backend;

#[cfg(feature = "local-embed")]
pub use fastembed_impl::*;
pub use hashing::*;
pub use http_backend::*;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Scale a vector to unit length (zero vectors are returned unchanged)
pub fn normalize_embedding(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

/// Trait for embedding providers.
///
/// Implementations must be length- and order-preserving and must not
/// normalize across a batch: embedding `[a, b]` then `[c]` equals embedding
/// `[a, b, c]`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Check a backend response against the request and the model dimension
pub fn validate_embeddings(
    embeddings: &[Vec<f32>],
    expected_count: usize,
    dimension: usize,
) -> Result<()> {
    if embeddings.len() != expected_count {
        return Err(Error::Embedding(format!(
            "Backend returned {} embeddings for {} inputs",
            embeddings.len(),
            expected_count
        )));
    }
    if let Some(mismatch) = embeddings.iter().find(|v| v.len() != dimension) {
        return Err(Error::DimensionMismatch {
            expected: dimension,
            actual: mismatch.len(),
        });
    }
    Ok(())
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.backend.as_str() {
        "http" => Ok(Arc::new(HttpEmbedder::new(config)?)),
        "hashing" => Ok(Arc::new(HashingEmbedder::new(
            &config.model,
            config.resolved_dimension(),
        )?)),
        #[cfg(feature = "local-embed")]
        "fastembed" => Ok(Arc::new(FastEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embed"))]
        "fastembed" => Err(Error::InvalidConfig(
            "Embedding backend 'fastembed' requires the 'local-embed' feature".to_string(),
        )),
        other => Err(Error::InvalidConfig(format!(
            "Unsupported embedding backend '{}'; expected http, hashing or fastembed",
            other
        ))),
    }
}

/// Helper to embed in batches, preserving input order
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let batch_size = batch_size.max(1);
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for (i, chunk) in texts.chunks(batch_size).enumerate() {
        debug!("Embedding batch {} ({} texts)", i + 1, chunk.len());
        let embeddings = embedder.embed(chunk.to_vec()).await?;
        all_embeddings.extend(embeddings);
    }

    Ok(all_embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_embedding() {
        let v = normalize_embedding(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalize_embedding(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_validate_embeddings() {
        let good = vec![vec![0.0; 3], vec![1.0; 3]];
        assert!(validate_embeddings(&good, 2, 3).is_ok());
        assert!(matches!(
            validate_embeddings(&good, 2, 4),
            Err(Error::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
        assert!(matches!(
            validate_embeddings(&good, 3, 3),
            Err(Error::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn test_batches_match_single_call() {
        let embedder = HashingEmbedder::new("test", 32).unwrap();
        let texts: Vec<String> = (0..10).map(|i| format!("text number {}", i)).collect();

        let batched = embed_in_batches(&embedder, texts.clone(), 3).await.unwrap();
        let whole = embedder.embed(texts).await.unwrap();

        assert_eq!(batched.len(), 10);
        assert_eq!(batched, whole);
    }

    #[tokio::test]
    async fn test_empty_input_is_empty_output() {
        let embedder = HashingEmbedder::new("test", 8).unwrap();
        assert!(embed_in_batches(&embedder, Vec::new(), 4).await.unwrap().is_empty());
    }

    #[test]
    fn test_create_embedder_rejects_unknown_backend() {
        let config = EmbeddingConfig {
            backend: "carrier-pigeon".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            create_embedder(&config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_create_hashing_embedder() {
        let config = EmbeddingConfig {
            backend: "hashing".to_string(),
            dimension: 48,
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.dimension(), 48);
    }
}
