//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::store::{StoreBackendKind, VectorStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub store_backend: String,
    /// File path for SQLite, URL for Qdrant
    pub store_location: String,
    pub metric: String,
    pub store_connected: bool,
    pub collection_name: String,
    pub collection_exists: bool,
    pub records: usize,
    pub dimension: Option<usize>,
    pub collections: Vec<String>,
    pub embedding_backend: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub llm_model: String,
}

/// Get system status
pub async fn cmd_status(config: &Config, store: &VectorStore) -> Result<StatusInfo> {
    info!("Getting status");

    let collection = &config.store.collection;
    let (store_connected, collections) = match store.collections().await {
        Ok(collections) => (true, collections),
        Err(e) => {
            debug!("Store connection error: {:?}", e);
            (false, Vec::new())
        }
    };
    let collection_exists = collections.iter().any(|c| c == collection);

    let (records, dimension) = if collection_exists {
        (
            store.count(collection).await?,
            store.dimension(collection).await?,
        )
    } else {
        (0, None)
    };

    let store_location = match config.store.backend {
        StoreBackendKind::Sqlite => config.store_path().display().to_string(),
        StoreBackendKind::Qdrant => config.store.url.clone(),
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        store_backend: store.backend_name().to_string(),
        store_location,
        metric: store.metric().to_string(),
        store_connected,
        collection_name: collection.clone(),
        collection_exists,
        records,
        dimension,
        collections,
        embedding_backend: config.embedding.backend.clone(),
        embedding_model: config.embedding.model.clone(),
        embedding_dimension: config.embedding.resolved_dimension(),
        llm_model: config.llm.model.clone(),
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 archivist Status\n");
    println!("Configuration: {}", status.config_path);
    println!("\nVector store ({}):", status.store_backend);
    println!("  Location: {}", status.store_location);
    println!("  Metric: {}", status.metric);

    let connection_status = if !status.store_connected {
        "✗ Not connected"
    } else if status.collection_exists {
        "✓ Connected"
    } else {
        "⚠ Connected (collection not created - run 'archivist ingest' to create)"
    };
    println!("  Status: {}", connection_status);
    println!("  Collection: {}", status.collection_name);
    println!("  Records: {}", status.records);
    if let Some(dim) = status.dimension {
        println!("  Dimension: {}", dim);
    }
    if status.collections.len() > 1 {
        println!("  Other collections: {}", status.collections.join(", "));
    }

    println!(
        "\nEmbedding: {} ({}, dim {})",
        status.embedding_model, status.embedding_backend, status.embedding_dimension
    );
    if let Some(dim) = status.dimension {
        if dim != status.embedding_dimension {
            println!(
                "  ⚠ Collection dimension {} differs from the embedder's {}",
                dim, status.embedding_dimension
            );
        }
    }
    println!("Answer model: {}", status.llm_model);
}
