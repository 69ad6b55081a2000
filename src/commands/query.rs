//! Query command implementation

use crate::error::Result;
use crate::retrieve::{RetrievedChunk, Retriever};
use serde::Serialize;
use tracing::info;

/// Query result for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutput {
    pub query: String,
    pub k: usize,
    pub results: Vec<RetrievedChunk>,
}

/// Retrieve the `k` best chunks for `query` (the configured default when `None`)
pub async fn cmd_query(retriever: &Retriever, query: &str, k: Option<usize>) -> Result<QueryOutput> {
    let k = k.unwrap_or_else(|| retriever.default_k());
    info!("Querying '{}' for {} results: {}", retriever.collection(), k, query);

    let results = retriever.retrieve_chunks(query, k).await?;

    Ok(QueryOutput {
        query: query.to_string(),
        k,
        results,
    })
}

/// Print query results to console
pub fn print_query_results(output: &QueryOutput) {
    println!("\n🔍 Query: {}\n", output.query);
    println!("Found {} results:\n", output.results.len());

    for (i, r) in output.results.iter().enumerate() {
        let source = r.source_id.as_deref().unwrap_or("-");
        println!("{}. [score: {:.3}] {} ({})", i + 1, r.score, r.id, source);
        println!("   {}\n", preview(&r.text, 200).replace('\n', " "));
    }
}

/// First `max_chars` characters, with an ellipsis when cut
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
