//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{open_store, StoreBackendKind};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub config_path: PathBuf,
    pub force: bool,
}

/// Write a default configuration and prepare the vector store
pub async fn cmd_init(options: InitOptions) -> Result<Config> {
    let InitOptions { config_path, force } = options;

    if config_path.exists() && !force {
        return Err(Error::InvalidConfig(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    let base_dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_base_dir);
    config.init_paths(Some(base_dir));
    config.paths.config_file = config_path.clone();

    config.validate()?;
    config.save()?;
    info!("Created config at {:?}", config_path);

    match open_store(&config).await {
        Ok(store) => info!("Vector store ready ({})", store.backend_name()),
        Err(e) if config.store.backend == StoreBackendKind::Qdrant => {
            warn!(
                "Could not connect to Qdrant at {}: {}. Make sure Qdrant is running.",
                config.store.url, e
            );
        }
        Err(e) => return Err(e),
    }

    Ok(config)
}

pub fn print_init_summary(config: &Config) {
    println!("✓ Initialized archivist at {:?}", config.paths.base_dir);
    println!("\nConfiguration: {:?}", config.paths.config_file);
    match config.store.backend {
        StoreBackendKind::Sqlite => println!("Vector store: {:?}", config.store_path()),
        StoreBackendKind::Qdrant => println!("Vector store: {}", config.store.url),
    }
    println!("\nNext steps:");
    println!("  archivist ingest ./path/to/docs        # Index local documents");
    println!("  archivist query \"what is bail\"         # Search the index");
    println!("  archivist ask \"when is bail refused?\"  # Answer from the index");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_writes_config_and_store() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        let config = cmd_init(InitOptions {
            config_path: config_path.clone(),
            force: false,
        })
        .await
        .unwrap();

        assert!(config_path.exists());
        assert!(config.store_path().starts_with(tmp.path()));
        assert!(config.store_path().exists());

        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded.store.collection, "legal_docs");
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "# mine").unwrap();

        let err = cmd_init(InitOptions {
            config_path: config_path.clone(),
            force: false,
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "# mine");

        cmd_init(InitOptions {
            config_path: config_path.clone(),
            force: true,
        })
        .await
        .unwrap();
        assert!(Config::load(&config_path).is_ok());
    }
}
