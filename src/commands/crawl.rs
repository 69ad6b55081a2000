//! Crawl command: collect pages from seed URLs and ingest them

use crate::commands::ingest::{ingest_documents, IngestStats};
use crate::config::Config;
use crate::crawl::Crawler;
use crate::document::Document;
use crate::embed::Embedder;
use crate::error::Result;
use crate::store::VectorStore;
use std::path::Path;
use tracing::info;

/// Crawl from `seeds`, optionally keep the page texts in `save_dir`, then
/// ingest what was collected
pub async fn cmd_crawl(
    config: &Config,
    embedder: &dyn Embedder,
    store: &VectorStore,
    seeds: &[String],
    max_pages: Option<usize>,
    save_dir: Option<&Path>,
) -> Result<IngestStats> {
    let mut crawler = Crawler::new(&config.crawl)?;
    if let Some(max) = max_pages {
        crawler = crawler.with_max_pages(max);
    }

    let documents = crawler.crawl(seeds).await?;
    if let Some(dir) = save_dir {
        save_documents(dir, &documents)?;
    }

    ingest_documents(config, embedder, store, documents).await
}

/// Write each document to `{dir}/{source_id}.txt`
pub fn save_documents(dir: &Path, documents: &[Document]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for doc in documents {
        let file_name = format!("{}.txt", doc.source_id.replace(['/', '\\'], "_"));
        std::fs::write(dir.join(file_name), &doc.text)?;
    }
    info!("Saved {} pages to {}", documents.len(), dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashingEmbedder;
    use crate::store::{Metric, SqliteBackend};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_save_documents_flattens_ids() {
        let tmp = TempDir::new().unwrap();
        let docs = vec![Document::new("Law_of_India", "text"), Document::new("a/b", "nested")];

        save_documents(tmp.path(), &docs).unwrap();

        assert_eq!(
            std::fs::read_to_string(tmp.path().join("Law_of_India.txt")).unwrap(),
            "text"
        );
        assert!(tmp.path().join("a_b.txt").exists());
    }

    #[tokio::test]
    async fn test_crawl_ingests_collected_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/Indian_law"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><div class="mw-parser-output"><p>Courts interpret statutes.</p></div></body></html>"#,
            ))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let backend = SqliteBackend::open(&tmp.path().join("store.db"), Metric::Cosine)
            .await
            .unwrap();
        let store = VectorStore::new(Box::new(backend), 5000, 0).unwrap();
        let embedder = HashingEmbedder::new("hash", 32).unwrap();
        let mut config = Config::default();
        config.crawl.rate_limit_per_host = 1000.0;

        let saved = tmp.path().join("pages");
        let stats = cmd_crawl(
            &config,
            &embedder,
            &store,
            &[format!("{}/wiki/Indian_law", server.uri())],
            Some(5),
            Some(&saved),
        )
        .await
        .unwrap();

        assert_eq!(stats.documents_seen, 1);
        assert_eq!(stats.records_written, 1);
        assert!(saved.join("Indian_law.txt").exists());
    }
}
