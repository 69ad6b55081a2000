use super::{validate_embeddings, Embedder};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct EmbedTextRequest<'a> {
    model: &'a str,
    inputs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Embeddings { embeddings: Vec<Vec<f32>> },
    Vectors { vectors: Vec<Vec<f32>> },
    Data { data: Vec<EmbeddingData> },
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_embeddings(self) -> Vec<Vec<f32>> {
        match self {
            EmbeddingResponse::Embeddings { embeddings } => embeddings,
            EmbeddingResponse::Vectors { vectors } => vectors,
            EmbeddingResponse::Data { data } => data.into_iter().map(|d| d.embedding).collect(),
        }
    }
}

/// Embedder backed by a remote embedding server.
///
/// Requests go to `POST {url}/v1/embed/text` with `{model, inputs}`. The
/// response may carry `embeddings`, `vectors`, or OpenAI-style `data`.
pub struct HttpEmbedder {
    client: Client,
    base_url: Url,
    retries: usize,
    model_id: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url,
            retries: config.retries,
            model_id: config.model.clone(),
            dimension: config.resolved_dimension(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::InvalidConfig(format!("Invalid embedding backend URL: {}", e)))
    }

    async fn send_with_retry<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let mut last_err: Option<Error> = None;
        for attempt in 0..=self.retries {
            let req = request.try_clone().ok_or_else(|| {
                Error::Embedding("Failed to clone backend request".to_string())
            })?;
            match req.send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(ok) => return Ok(ok.json::<T>().await?),
                    Err(e) => last_err = Some(Error::Embedding(e.to_string())),
                },
                Err(e) => last_err = Some(Error::Embedding(e.to_string())),
            }

            if attempt < self.retries {
                debug!("Embedding request failed, retrying (attempt {})", attempt + 1);
                tokio::time::sleep(Duration::from_millis(200 * (attempt + 1) as u64)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::Embedding("Embedding backend request failed".to_string())
        }))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let url = self.endpoint("/v1/embed/text")?;
        let request = EmbedTextRequest {
            model: &self.model_id,
            inputs: texts,
        };
        let parsed: EmbeddingResponse = self
            .send_with_retry(self.client.post(url).json(&request))
            .await?;
        let embeddings = parsed.into_embeddings();
        validate_embeddings(&embeddings, expected, self.dimension)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            backend: "http".to_string(),
            model: "test-model".to_string(),
            dimension,
            url: server.uri(),
            retries: 0,
            ..EmbeddingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_embed_parses_embeddings_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .and(body_partial_json(json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [[0.1, 0.2], [0.3, 0.4]]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&config_for(&server, 2)).unwrap();
        let out = embedder
            .embed(vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(out, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn test_embed_parses_openai_data_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [1.0, 0.0, 0.0]}]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&config_for(&server, 3)).unwrap();
        let out = embedder.embed(vec!["a".to_string()]).await.unwrap();
        assert_eq!(out, vec![vec![1.0, 0.0, 0.0]]);
    }

    #[tokio::test]
    async fn test_embed_rejects_wrong_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "vectors": [[1.0, 0.0]]
            })))
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&config_for(&server, 3)).unwrap();
        let err = embedder.embed(vec!["a".to_string()]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_embed_retries_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed/text"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let mut config = config_for(&server, 2);
        config.retries = 2;
        let embedder = HttpEmbedder::new(&config).unwrap();

        let err = embedder.embed(vec!["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let embedder = HttpEmbedder::new(&config_for(&server, 2)).unwrap();
        assert!(embedder.embed(Vec::new()).await.unwrap().is_empty());
    }
}
