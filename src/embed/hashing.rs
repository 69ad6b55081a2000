//! Feature-hashing embedder
//!
//! Maps each lowercased word onto a bucket with blake3 and accumulates a
//! signed count, then L2-normalizes. Needs no model or network and gives
//! identical vectors for identical text, which makes it the embedder of
//! choice for tests and air-gapped indexes. Texts sharing vocabulary score
//! high under cosine similarity.

use super::{normalize_embedding, Embedder};
use crate::error::{Error, Result};
use async_trait::async_trait;

pub struct HashingEmbedder {
    model_name: String,
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(model_name: &str, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidConfig(
                "Hashing embedder dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            model_name: model_name.to_string(),
            dimension,
        })
    }

    /// Embed one text. Pure function of `(text, dimension)`.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[..8]);
            let bucket = (u64::from_le_bytes(word) % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        normalize_embedding(&vector)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
