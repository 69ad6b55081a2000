//! Embedding artifacts: embeddings computed offline, saved as JSON and
//! indexed later without re-embedding

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Provenance of one artifact row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub source: String,
    pub chunk: String,
}

/// `embeddings[i]` is the vector for `metadata[i]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingArtifact {
    pub model: String,
    pub dimension: usize,
    pub embeddings: Vec<Vec<f32>>,
    pub metadata: Vec<ArtifactEntry>,
}

impl EmbeddingArtifact {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension,
            embeddings: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn push(&mut self, embedding: Vec<f32>, entry: ArtifactEntry) {
        self.embeddings.push(embedding);
        self.metadata.push(entry);
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.embeddings.len() != self.metadata.len() {
            return Err(Error::InvalidArtifact(format!(
                "{} embeddings but {} metadata entries",
                self.embeddings.len(),
                self.metadata.len()
            )));
        }
        if let Some((i, v)) = self
            .embeddings
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dimension)
        {
            return Err(Error::InvalidArtifact(format!(
                "embedding {} has dimension {}, expected {}",
                i,
                v.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_vec(self)?)?;
        info!("Wrote {} embeddings to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let artifact: Self = serde_json::from_slice(&bytes)
            .map_err(|e| Error::InvalidArtifact(format!("{}: {}", path.display(), e)))?;
        artifact.validate()?;
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(source: &str, chunk: &str) -> ArtifactEntry {
        ArtifactEntry {
            source: source.to_string(),
            chunk: chunk.to_string(),
        }
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/embeddings.json");

        let mut artifact = EmbeddingArtifact::new("hash", 2);
        artifact.push(vec![0.5, 0.5], entry("a.txt", "alpha"));
        artifact.push(vec![1.0, 0.0], entry("b.txt", "beta"));
        artifact.save(&path).unwrap();

        let loaded = EmbeddingArtifact::load(&path).unwrap();
        assert_eq!(loaded, artifact);
    }

    #[test]
    fn test_length_mismatch_rejected_on_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"model":"m","dimension":2,"embeddings":[[1.0,0.0],[0.0,1.0]],"metadata":[{"source":"a","chunk":"x"}]}"#,
        )
        .unwrap();

        assert!(matches!(
            EmbeddingArtifact::load(&path),
            Err(Error::InvalidArtifact(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_rejected_on_save() {
        let tmp = TempDir::new().unwrap();
        let mut artifact = EmbeddingArtifact::new("m", 3);
        artifact.push(vec![1.0, 0.0], entry("a", "x"));

        assert!(matches!(
            artifact.save(&tmp.path().join("x.json")),
            Err(Error::InvalidArtifact(_))
        ));
    }

    #[test]
    fn test_garbage_file_is_invalid_artifact() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("junk.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            EmbeddingArtifact::load(&path),
            Err(Error::InvalidArtifact(_))
        ));
    }
}
