//! Text normalization policies applied before chunking
//!
//! Normalization is a replaceable policy, not part of the chunking contract.
//! Chunk offsets always refer to the normalized text.

use crate::error::{Error, Result};
use regex::Regex;

/// A text cleaning policy
pub trait Normalizer: Send + Sync {
    fn normalize(&self, text: &str) -> String;
}

/// Leaves text untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNormalizer;

impl Normalizer for IdentityNormalizer {
    fn normalize(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Collapses whitespace runs to a single space and trims the ends
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceNormalizer;

impl Normalizer for WhitespaceNormalizer {
    fn normalize(&self, text: &str) -> String {
        collapse_whitespace(text)
    }
}

/// Cleaning tuned for legal texts: drops page furniture, case citations and
/// section references, then strips symbols.
///
/// The citation patterns follow Indian and US reporter formats and are
/// heuristics.
#[derive(Debug, Clone)]
pub struct LegalTextNormalizer {
    page_furniture: Regex,
    citations: Regex,
    sections: Regex,
    symbols: Regex,
}

impl LegalTextNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            page_furniture: compile(r"(?i)Page \d+ of \d+|\d{4} \w+ \d+|\(c\) \d{4}.*?$")?,
            citations: compile(
                r"(?i)[A-Za-z\s]+ v\.? [A-Za-z\s]+, \d+ [A-Z\.]+ \d+ \(\d{4}\)|\[\d{4}\] \d+ [A-Z]+ \d+",
            )?,
            sections: compile(
                r"(?i)(Section|Sec\.|§)\s*\d+[A-Za-z]*\d*\s*(?:\([a-zA-Z0-9\s]*\))?",
            )?,
            symbols: compile(r"[^\w\s.,!?;:]")?,
        })
    }
}

impl Normalizer for LegalTextNormalizer {
    fn normalize(&self, text: &str) -> String {
        let text = collapse_whitespace(text);
        let text = self.page_furniture.replace_all(&text, "");
        let text = self.citations.replace_all(&text, "");
        let text = self.sections.replace_all(&text, "");
        let text = self.symbols.replace_all(&text, "");
        collapse_whitespace(&text)
    }
}

/// Resolve a policy by its configuration name
pub fn normalizer_for(name: &str) -> Result<Box<dyn Normalizer>> {
    match name {
        "none" => Ok(Box::new(IdentityNormalizer)),
        "whitespace" => Ok(Box::new(WhitespaceNormalizer)),
        "legal" => Ok(Box::new(LegalTextNormalizer::new()?)),
        other => Err(Error::InvalidConfig(format!(
            "Unknown normalizer '{}'",
            other
        ))),
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidConfig(format!("Invalid pattern: {}", e)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
