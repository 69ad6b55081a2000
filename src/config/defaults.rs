//! Default values for configuration

use crate::store::{Metric, StoreBackendKind};

/// Default vector store backend (embedded SQLite file)
pub fn default_store_backend() -> StoreBackendKind {
    StoreBackendKind::Sqlite
}

/// Default Qdrant gRPC URL for local development (port 6334, not 6333 REST)
pub fn default_qdrant_url() -> String {
    std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default collection name
pub fn default_collection_name() -> String {
    "legal_docs".to_string()
}

/// Default maximum records per physical write.
/// Kept below the 5461-record ceiling of the stores we target.
pub fn default_store_batch_limit() -> usize {
    5000
}

/// Default similarity metric
pub fn default_store_metric() -> Metric {
    Metric::Cosine
}

/// Default retries for a failed sub-batch
pub fn default_store_write_retries() -> u32 {
    2
}

/// Default embedding backend kind
pub fn default_embedding_backend() -> String {
    "http".to_string()
}

/// Default embedding model (sentence-transformers/all-MiniLM-L6-v2)
pub fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

/// Default embedding dimension (matches the default model)
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default embedding backend URL
pub fn default_embedding_url() -> String {
    std::env::var("ARCHIVIST_EMBEDDING_URL").unwrap_or_else(|_| "http://127.0.0.1:7997".to_string())
}

/// Default embedding request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default embedding request retries
pub fn default_embedding_retries() -> usize {
    2
}

/// Default maximum characters per chunk
pub fn default_chunk_max_chars() -> usize {
    500
}

/// Default overlap characters between chunks
pub fn default_chunk_overlap() -> usize {
    50
}

/// Default normalization policy
pub fn default_chunk_normalizer() -> String {
    "none".to_string()
}

/// Default number of query results
pub fn default_query_k() -> usize {
    10
}

/// Default maximum query results
pub fn default_query_max_k() -> usize {
    100
}

/// Default context budget in characters
pub fn default_context_budget() -> usize {
    4000
}

/// Default separator between chunks in the assembled context
pub fn default_context_separator() -> String {
    "\n".to_string()
}

/// Default LLM endpoint (OpenAI-compatible)
pub fn default_llm_url() -> String {
    std::env::var("ARCHIVIST_LLM_URL")
        .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string())
}

/// Default LLM model
pub fn default_llm_model() -> String {
    "llama3-70b-8192".to_string()
}

/// Default environment variable holding the LLM API key
pub fn default_llm_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

/// Default maximum generated tokens
pub fn default_llm_max_output_tokens() -> u32 {
    1024
}

/// Default synthesis timeout in seconds
pub fn default_llm_timeout() -> u64 {
    60
}

/// Default number of documents chunked and embedded concurrently
pub fn default_ingest_concurrency() -> usize {
    4
}

/// Default file extensions picked up by directory ingestion
pub fn default_ingest_extensions() -> Vec<String> {
    vec!["txt".to_string(), "md".to_string()]
}

/// Default maximum pages per crawl
pub fn default_crawl_max_pages() -> usize {
    30
}

/// Default rate limit (requests per second per host)
pub fn default_crawl_rate_limit() -> f64 {
    1.0
}

/// Default request timeout in seconds
pub fn default_crawl_timeout() -> u64 {
    10
}

/// Default user agent
pub fn default_crawl_user_agent() -> String {
    format!("archivist/{} (Corpus Builder)", env!("CARGO_PKG_VERSION"))
}

/// Default CSS selector for the main content of a page
pub fn default_crawl_content_selector() -> String {
    "div.mw-parser-output".to_string()
}

/// Default keywords a link path must contain to be followed
pub fn default_crawl_link_keywords() -> Vec<String> {
    ["india", "law", "legal", "court", "act", "constitution"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Default path segments that are never followed
pub fn default_crawl_skip_prefixes() -> Vec<String> {
    vec!["File:".to_string()]
}
