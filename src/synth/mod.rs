//! Answer synthesis
//!
//! The narrow seam between retrieval and a language model: given an
//! assembled context and the question, produce answer text.

use crate::config::LlmConfig;
use crate::context::{build_prompt, AssembledContext};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Produces an answer from retrieved context
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    /// Every failure is reported as [`Error::Synthesis`]
    async fn synthesize(&self, context: &AssembledContext, query: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for OpenAI-compatible chat completion endpoints (Groq, vLLM,
/// llama.cpp server, OpenAI itself)
pub struct HttpSynthesizer {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_output_tokens: u32,
    timeout: Duration,
}

impl HttpSynthesizer {
    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self> {
        url::Url::parse(&config.url)?;
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: format!("{}/chat/completions", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            max_output_tokens: config.max_output_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn complete(&self, prompt: String) -> std::result::Result<String, String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            max_tokens: self.max_output_tokens,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?
            .error_for_status()
            .map_err(|e| format!("model endpoint returned an error: {}", e))?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("unreadable response: {}", e))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| "response contained no choices".to_string())?;

        if answer.is_empty() {
            return Err("model returned an empty answer".to_string());
        }
        Ok(answer)
    }
}

#[async_trait]
impl AnswerSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, context: &AssembledContext, query: &str) -> Result<String> {
        let prompt = build_prompt(context, query);
        debug!(
            "Synthesizing with {} ({} context chars)",
            self.model,
            context.len()
        );

        let outcome = tokio::time::timeout(self.timeout, self.complete(prompt)).await;
        let reason = match outcome {
            Ok(Ok(answer)) => {
                info!("Answer received from {}", self.model);
                return Ok(answer);
            }
            Ok(Err(reason)) => reason,
            Err(_) => format!("timed out after {:?}", self.timeout),
        };

        Err(Error::synthesis(reason, query, Vec::new(), context.clone()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
