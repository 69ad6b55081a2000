//! Corpus documents and the local directory loader

use crate::error::{Error, Result};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// A raw document, identified by a `source_id` unique within the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source_id: String,
    pub text: String,
}

impl Document {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

/// Load every file under `root` whose extension is in `extensions`.
///
/// The walk honours `.gitignore`. The `source_id` of each document is its
/// path relative to `root`, with `/` separators. Files that are not valid
/// UTF-8 are skipped with a warning. Results are sorted by `source_id`.
pub fn load_dir(root: &Path, extensions: &[String]) -> Result<Vec<Document>> {
    if !root.is_dir() {
        return Err(Error::InvalidConfig(format!(
            "Not a directory: {}",
            root.display()
        )));
    }

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .require_git(false)
        .build();

    let mut documents = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let path = entry.path();
        if !has_extension(path, extensions) {
            continue;
        }

        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let source_id = path
            .strip_prefix(root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        debug!("Loaded {} ({} bytes)", source_id, text.len());
        documents.push(Document::new(source_id, text));
    }

    documents.sort_by(|a, b| a.source_id.cmp(&b.source_id));
    Ok(documents)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
