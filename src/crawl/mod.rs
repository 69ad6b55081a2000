//! Bounded web crawling
//!
//! This module provides:
//! - An explicit breadth-first frontier with a visited set
//! - A page budget counting pages that yielded text
//! - Per-host rate limiting
//! - Paragraph extraction from a configurable content area

mod extract;

pub use extract::*;

use crate::config::CrawlConfig;
use crate::document::Document;
use crate::error::{Error, Result};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Pending and seen URLs. A URL enters the queue at most once.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<Url>,
    seen: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `url` unless it was queued before; returns whether it was added
    pub fn push(&mut self, url: Url) -> bool {
        if !self.seen.insert(url.as_str().to_string()) {
            return false;
        }
        self.queue.push_back(url);
        true
    }

    pub fn pop(&mut self) -> Option<Url> {
        self.queue.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn seen(&self) -> usize {
        self.seen.len()
    }
}

/// Crawler state shared across one crawl
pub struct Crawler {
    client: Client,
    extractor: Extractor,
    limiter: DefaultKeyedRateLimiter<String>,
    max_pages: usize,
}

impl Crawler {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Crawl(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            extractor: Extractor::new(config)?,
            limiter: RateLimiter::keyed(host_quota(config.rate_limit_per_host)?),
            max_pages: config.max_pages,
        })
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Fetch a page body, waiting for the host's rate limit first
    pub async fn fetch(&self, url: &Url) -> Result<String> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::Crawl(format!("URL has no host: {}", url)))?
            .to_string();
        self.limiter.until_key_ready(&host).await;

        debug!("Fetching: {}", url);
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Crawl(format!("HTTP {}: {}", status, url)));
        }
        Ok(response.text().await?)
    }

    /// Crawl breadth-first from `seeds` until the frontier is empty or
    /// `max_pages` pages with text have been collected.
    ///
    /// Fetch failures are logged and skipped.
    pub async fn crawl(&self, seeds: &[String]) -> Result<Vec<Document>> {
        let mut frontier = Frontier::new();
        for seed in seeds {
            frontier.push(Url::parse(seed)?);
        }

        let mut documents = Vec::new();

        while documents.len() < self.max_pages {
            let Some(url) = frontier.pop() else {
                break;
            };

            let html = match self.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Failed to fetch {}: {}", url, e);
                    continue;
                }
            };

            let page = self.extractor.extract(&html, &url);
            if page.text.is_empty() {
                warn!("No content found in {}", url);
            } else {
                info!("Scraped {} ({} chars)", url, page.text.chars().count());
                documents.push(Document::new(source_id_for(&url), page.text));
            }

            for link in page.links {
                frontier.push(link);
            }
        }

        info!(
            "Crawl finished: {} pages collected, {} URLs seen, {} left in frontier",
            documents.len(),
            frontier.seen(),
            frontier.pending()
        );
        Ok(documents)
    }
}

fn host_quota(requests_per_second: f64) -> Result<Quota> {
    if !(requests_per_second.is_finite() && requests_per_second > 0.0) {
        return Err(Error::InvalidConfig(
            "crawl.rate_limit_per_host must be positive".to_string(),
        ));
    }
    Quota::with_period(Duration::from_secs_f64(1.0 / requests_per_second)).ok_or_else(|| {
        Error::InvalidConfig("crawl.rate_limit_per_host is too high".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(body: &str, links: &[&str]) -> String {
        let anchors: String = links
            .iter()
            .map(|l| format!(r#"<a href="{}">link</a>"#, l))
            .collect();
        format!(
            r#"<html><body><div class="mw-parser-output"><p>{}</p>{}</div></body></html>"#,
            body, anchors
        )
    }

    async fn serve(server: &MockServer, route: &str, html: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(server)
            .await;
    }

    fn fast_config() -> CrawlConfig {
        CrawlConfig {
            rate_limit_per_host: 1000.0,
            ..CrawlConfig::default()
        }
    }

    #[test]
    fn test_frontier_deduplicates() {
        let mut frontier = Frontier::new();
        let a = Url::parse("https://x.org/wiki/Law").unwrap();

        assert!(frontier.push(a.clone()));
        assert!(!frontier.push(a.clone()));
        assert_eq!(frontier.pop(), Some(a.clone()));
        assert!(!frontier.push(a));
        assert_eq!(frontier.pop(), None);
    }

    #[test]
    fn test_rate_limit_must_be_positive() {
        assert!(host_quota(0.0).is_err());
        assert!(host_quota(f64::NAN).is_err());
        assert!(host_quota(2.0).is_ok());
    }

    #[tokio::test]
    async fn test_crawl_follows_keyword_links_breadth_first() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/wiki/Law_of_India",
            page("Law of India.", &["/wiki/Indian_Contract_Act", "/wiki/Cricket", "/wiki/File:Law.png"]),
        )
        .await;
        serve(
            &server,
            "/wiki/Indian_Contract_Act",
            page("The Contract Act.", &["/wiki/Law_of_India"]),
        )
        .await;

        let crawler = Crawler::new(&fast_config()).unwrap();
        let docs = crawler
            .crawl(&[format!("{}/wiki/Law_of_India", server.uri())])
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0], Document::new("Law_of_India", "Law of India."));
        assert_eq!(docs[1], Document::new("Indian_Contract_Act", "The Contract Act."));

        // Cricket and the file page were never requested, the seed only once
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn test_crawl_respects_page_budget() {
        let server = MockServer::start().await;
        serve(&server, "/wiki/Law_1", page("one", &["/wiki/Law_2"])).await;
        serve(&server, "/wiki/Law_2", page("two", &["/wiki/Law_3"])).await;
        serve(&server, "/wiki/Law_3", page("three", &[])).await;

        let crawler = Crawler::new(&fast_config()).unwrap().with_max_pages(2);
        let docs = crawler
            .crawl(&[format!("{}/wiki/Law_1", server.uri())])
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_crawl_skips_failed_and_empty_pages() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/wiki/Law_index",
            r#"<html><body><div class="mw-parser-output"><a href="/wiki/Law_gone">x</a><a href="/wiki/Law_ok">y</a></div></body></html>"#
                .to_string(),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/wiki/Law_gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        serve(&server, "/wiki/Law_ok", page("kept", &[])).await;

        let crawler = Crawler::new(&fast_config()).unwrap();
        let docs = crawler
            .crawl(&[format!("{}/wiki/Law_index", server.uri())])
            .await
            .unwrap();

        assert_eq!(docs, vec![Document::new("Law_ok", "kept")]);
    }
}
