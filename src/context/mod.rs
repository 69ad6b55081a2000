//! Context assembly under a character budget, and prompt layout

use crate::config::QueryConfig;
use crate::retrieve::RetrievedChunk;
use serde::{Deserialize, Serialize};

/// Retrieved text joined in rank order, capped at a character budget
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub text: String,
    /// How many leading chunks contributed
    pub chunks_used: usize,
    /// Whether any retrieved text was left out or cut
    pub truncated: bool,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    separator: String,
    truncation_marker: Option<String>,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new("\n")
    }
}

impl ContextAssembler {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            truncation_marker: None,
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(&config.context_separator).with_truncation_marker(config.truncation_marker.clone())
    }

    /// Appended (inside the budget) when the first chunk has to be cut
    pub fn with_truncation_marker(mut self, marker: Option<String>) -> Self {
        self.truncation_marker = marker;
        self
    }

    /// Join chunk texts best-first until the next one would overflow `budget`.
    ///
    /// A first chunk longer than the budget is cut to fit, so the context is
    /// never empty when there are results and `budget > 0`.
    pub fn assemble(&self, chunks: &[RetrievedChunk], budget: usize) -> AssembledContext {
        let mut context = AssembledContext::default();
        if budget == 0 {
            context.truncated = !chunks.is_empty();
            return context;
        }

        let separator_len = self.separator.chars().count();
        let mut used = 0;

        for (i, chunk) in chunks.iter().enumerate() {
            let text_len = chunk.text.chars().count();
            let needed = if i == 0 { text_len } else { separator_len + text_len };

            if used + needed <= budget {
                if i > 0 {
                    context.text.push_str(&self.separator);
                }
                context.text.push_str(&chunk.text);
                context.chunks_used += 1;
                used += needed;
                continue;
            }

            if i == 0 {
                context.text = self.cut(&chunk.text, budget);
                context.chunks_used = 1;
            }
            context.truncated = true;
            break;
        }

        context
    }

    fn cut(&self, text: &str, budget: usize) -> String {
        match &self.truncation_marker {
            Some(marker) if marker.chars().count() < budget => {
                let keep = budget - marker.chars().count();
                let mut out: String = text.chars().take(keep).collect();
                out.push_str(marker);
                out
            }
            _ => text.chars().take(budget).collect(),
        }
    }
}

/// Prompt sent to the answer model
pub fn build_prompt(context: &AssembledContext, query: &str) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {}\nAnswer concisely using only the context above:",
        context.text, query
    )
}
