//! Ask command: retrieve, assemble context and synthesize an answer

use crate::config::Config;
use crate::context::ContextAssembler;
use crate::error::{Error, Result, SynthesisError};
use crate::retrieve::{RetrievedChunk, Retriever};
use crate::synth::AnswerSynthesizer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output of one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub query: String,
    pub retrieved_chunks: Vec<RetrievedChunk>,
    pub answer: String,
}

/// The full query path: retrieval, context assembly, synthesis
pub struct QueryPipeline {
    retriever: Retriever,
    assembler: ContextAssembler,
    synthesizer: Arc<dyn AnswerSynthesizer>,
    budget: usize,
}

impl QueryPipeline {
    pub fn new(
        retriever: Retriever,
        assembler: ContextAssembler,
        synthesizer: Arc<dyn AnswerSynthesizer>,
        budget: usize,
    ) -> Self {
        Self {
            retriever,
            assembler,
            synthesizer,
            budget,
        }
    }

    pub fn from_config(
        config: &Config,
        retriever: Retriever,
        synthesizer: Arc<dyn AnswerSynthesizer>,
    ) -> Self {
        Self::new(
            retriever,
            ContextAssembler::from_config(&config.query),
            synthesizer,
            config.query.context_budget,
        )
    }

    /// Character budget for the assembled context
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    /// Answer `query` from the `k` best chunks (the configured default when
    /// `None`).
    ///
    /// Retrieval errors propagate unchanged. A synthesis failure comes back
    /// as [`Error::Synthesis`] carrying the retrieved chunks and context, so
    /// [`retry_synthesis`](Self::retry_synthesis) can try again without
    /// touching the store.
    pub async fn run(&self, query: &str, k: Option<usize>) -> Result<Answer> {
        let k = k.unwrap_or_else(|| self.retriever.default_k());
        let chunks = self.retriever.retrieve_chunks(query, k).await?;
        let context = self.assembler.assemble(&chunks, self.budget);
        debug!(
            "Assembled {} of {} chunks ({} chars, truncated: {})",
            context.chunks_used,
            chunks.len(),
            context.len(),
            context.truncated
        );

        match self.synthesizer.synthesize(&context, query).await {
            Ok(answer) => Ok(Answer {
                query: query.to_string(),
                retrieved_chunks: chunks,
                answer,
            }),
            Err(e) => {
                let reason = match e {
                    Error::Synthesis(failure) => failure.reason,
                    other => other.to_string(),
                };
                warn!("Synthesis failed for '{}': {}", query, reason);
                Err(Error::synthesis(reason, query, chunks, context))
            }
        }
    }

    /// Synthesize again from a failure's preserved context
    pub async fn retry_synthesis(&self, failure: &SynthesisError) -> Result<Answer> {
        info!("Retrying synthesis for '{}'", failure.query);
        match self
            .synthesizer
            .synthesize(&failure.context, &failure.query)
            .await
        {
            Ok(answer) => Ok(Answer {
                query: failure.query.clone(),
                retrieved_chunks: failure.retrieved_chunks.clone(),
                answer,
            }),
            Err(e) => {
                let reason = match e {
                    Error::Synthesis(inner) => inner.reason,
                    other => other.to_string(),
                };
                Err(Error::synthesis(
                    reason,
                    &failure.query,
                    failure.retrieved_chunks.clone(),
                    failure.context.clone(),
                ))
            }
        }
    }
}

/// Ask a question, retrying synthesis up to `retries` times on failure
pub async fn cmd_ask(
    pipeline: &QueryPipeline,
    query: &str,
    k: Option<usize>,
    retries: u32,
) -> Result<Answer> {
    info!("Asking: {}", query);
    let mut outcome = pipeline.run(query, k).await;

    for attempt in 1..=retries {
        let failure = match &outcome {
            Err(Error::Synthesis(failure)) => failure.clone(),
            _ => break,
        };
        debug!("Synthesis retry {}/{}", attempt, retries);
        outcome = pipeline.retry_synthesis(&failure).await;
    }

    outcome
}

/// Print an answer and its sources to console
pub fn print_answer(answer: &Answer) {
    println!("\n💬 {}\n", answer.query);
    println!("{}\n", answer.answer);

    if answer.retrieved_chunks.is_empty() {
        return;
    }
    println!("Sources:");
    for (i, chunk) in answer.retrieved_chunks.iter().enumerate() {
        println!(
            "  {}. [score: {:.3}] {}",
            i + 1,
            chunk.score,
            chunk.source_id.as_deref().unwrap_or(&chunk.id)
        );
    }
}
