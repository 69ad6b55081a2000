//! Page text and link extraction

use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use scraper::{Html, Selector};
use url::Url;

/// What a fetched page contributes to the crawl
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    /// Non-empty paragraph texts joined by newlines
    pub text: String,
    /// Candidate links, fragment stripped, in document order
    pub links: Vec<Url>,
}

/// Compiled extraction rules
#[derive(Debug, Clone)]
pub struct Extractor {
    content: Selector,
    body: Selector,
    paragraph: Selector,
    anchor: Selector,
    link_keywords: Vec<String>,
    skip_prefixes: Vec<String>,
}

impl Extractor {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        Ok(Self {
            content: selector(&config.content_selector)?,
            body: selector("body")?,
            paragraph: selector("p")?,
            anchor: selector("a[href]")?,
            link_keywords: config
                .link_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            skip_prefixes: config.skip_prefixes.clone(),
        })
    }

    /// Pull paragraph text and followable links out of `html`.
    ///
    /// Only the content area is considered; pages without one fall back to
    /// `<body>`.
    pub fn extract(&self, html: &str, page_url: &Url) -> ExtractedPage {
        let document = Html::parse_document(html);
        let root = document
            .select(&self.content)
            .next()
            .or_else(|| document.select(&self.body).next());

        let Some(root) = root else {
            return ExtractedPage {
                text: String::new(),
                links: Vec::new(),
            };
        };

        let text = root
            .select(&self.paragraph)
            .map(|p| p.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let mut links = Vec::new();
        for anchor in root.select(&self.anchor) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Ok(mut link) = page_url.join(href) else {
                continue;
            };
            link.set_fragment(None);
            if self.should_follow(&link, page_url) && !links.contains(&link) {
                links.push(link);
            }
        }

        ExtractedPage { text, links }
    }

    /// Same host, a keyword somewhere in the path, and not a skipped namespace
    pub fn should_follow(&self, link: &Url, page_url: &Url) -> bool {
        if !matches!(link.scheme(), "http" | "https") || link.host_str() != page_url.host_str() {
            return false;
        }

        let last = last_segment(link);
        if self.skip_prefixes.iter().any(|p| last.starts_with(p.as_str())) {
            return false;
        }

        let path = link.path().to_lowercase();
        self.link_keywords.is_empty() || self.link_keywords.iter().any(|k| path.contains(k.as_str()))
    }
}

/// Document id for a crawled page: its last path segment, `:` replaced
pub fn source_id_for(url: &Url) -> String {
    let last = last_segment(url);
    if last.is_empty() {
        return url.host_str().unwrap_or("index").to_string();
    }
    last.replace(':', "_")
}

fn last_segment(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        .unwrap_or_default()
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| Error::InvalidConfig(format!("Invalid CSS selector '{}': {:?}", css, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <html><body>
          <div id="nav"><p>Navigation noise</p><a href="/wiki/Law_nav">law nav</a></div>
          <div class="mw-parser-output">
            <p>The Constitution of India is the supreme law.</p>
            <p>   </p>
            <p>It came into force in 1950.</p>
            <a href="/wiki/Supreme_Court_of_India#History">court</a>
            <a href="/wiki/File:Emblem_law.svg">emblem</a>
            <a href="/wiki/Cricket">cricket</a>
            <a href="https://other.example/wiki/Indian_law">elsewhere</a>
            <a href="/wiki/Supreme_Court_of_India">court again</a>
          </div>
        </body></html>
    "##;

    fn extractor() -> Extractor {
        Extractor::new(&CrawlConfig::default()).unwrap()
    }

    #[test]
    fn test_extracts_paragraphs_from_content_area() {
        let url = Url::parse("https://en.wikipedia.org/wiki/Constitution_of_India").unwrap();
        let page = extractor().extract(PAGE, &url);

        assert_eq!(
            page.text,
            "The Constitution of India is the supreme law.\nIt came into force in 1950."
        );
    }

    #[test]
    fn test_follows_only_relevant_same_host_links() {
        let url = Url::parse("https://en.wikipedia.org/wiki/Constitution_of_India").unwrap();
        let page = extractor().extract(PAGE, &url);

        let links: Vec<&str> = page.links.iter().map(|u| u.as_str()).collect();
        assert_eq!(links, vec!["https://en.wikipedia.org/wiki/Supreme_Court_of_India"]);
    }

    #[test]
    fn test_falls_back_to_body() {
        let url = Url::parse("https://example.org/law").unwrap();
        let page = extractor().extract("<html><body><p>Plain page</p></body></html>", &url);
        assert_eq!(page.text, "Plain page");
    }

    #[test]
    fn test_source_id_for() {
        let url = Url::parse("https://en.wikipedia.org/wiki/Category:Indian_law").unwrap();
        assert_eq!(source_id_for(&url), "Category_Indian_law");

        let root = Url::parse("https://example.org/").unwrap();
        assert_eq!(source_id_for(&root), "example.org");
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let config = CrawlConfig {
            content_selector: "div[".to_string(),
            ..CrawlConfig::default()
        };
        assert!(matches!(Extractor::new(&config), Err(Error::InvalidConfig(_))));
    }
}
