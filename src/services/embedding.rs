//! Embedding providers: an HTTP client for remote servers and a local
//! hashing embedder for offline use.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::EmbeddingError;
use crate::models::{EmbeddingApi, EmbeddingConfig};
use crate::utils::RetryPolicy;

/// Capability to turn text into fixed-length vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }

    /// Model identifier, reported in index statistics.
    fn model(&self) -> &str;
}

/// Build the configured provider. `offline` selects the local hashing
/// embedder regardless of the HTTP settings.
pub fn create_provider(
    config: &EmbeddingConfig,
    offline: bool,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    if offline {
        return Ok(Arc::new(HashEmbedder::new(config.dimension as usize)));
    }
    Ok(Arc::new(EmbeddingClient::new(config)?))
}

/// Request body for the text-embeddings-inference `/embed` endpoint.
#[derive(Debug, Serialize)]
struct TeiRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct TeiResponse(Vec<Vec<f32>>);

/// Request body for the OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for a remote embedding server.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: Client,
    api: EmbeddingApi,
    base_url: String,
    model: String,
    api_key: Option<String>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        if config.api == EmbeddingApi::OpenAi && config.api_key.is_none() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api: config.api,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            batch_size: (config.batch_size as usize).max(1),
            retry: RetryPolicy::with_retries(config.max_retries),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        match self.api {
            EmbeddingApi::Tei => format!("{}/embed", self.base_url),
            EmbeddingApi::OpenAi => format!("{}/embeddings", self.base_url),
        }
    }

    async fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = self.endpoint();
        let request = match self.api {
            EmbeddingApi::Tei => self.client.post(&url).json(&TeiRequest {
                inputs: texts,
                truncate: true,
            }),
            EmbeddingApi::OpenAi => {
                let request = self.client.post(&url).json(&OpenAiRequest {
                    model: &self.model,
                    input: texts,
                });
                match &self.api_key {
                    Some(key) => request.bearer_auth(key),
                    None => request,
                }
            }
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Timeout
            } else if e.is_connect() {
                EmbeddingError::ConnectionError(e.to_string())
            } else {
                EmbeddingError::RequestError(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let embeddings = match self.api {
            EmbeddingApi::Tei => {
                let parsed: TeiResponse = response
                    .json()
                    .await
                    .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
                parsed.0
            }
            EmbeddingApi::OpenAi => {
                let mut parsed: OpenAiResponse = response
                    .json()
                    .await
                    .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
                parsed.data.sort_by_key(|d| d.index);
                parsed.data.into_iter().map(|d| d.embedding).collect()
            }
        };

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let embeddings = self
                .retry
                .run("embedding request", || self.embed_single_batch(batch))
                .await?;
            all_embeddings.extend(embeddings);
        }

        debug!("embedded {} texts with {}", texts.len(), self.model);
        Ok(all_embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Deterministic bag-of-words embedder based on feature hashing.
///
/// Each lowercase alphanumeric token adds 1.0 to the bucket selected by its
/// SHA-256 digest; the result is L2-normalized. Texts sharing words land close
/// together, which is enough for local use and tests.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    model: String,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model: format!("hash-{}", dimension),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tei_config(url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            api: EmbeddingApi::Tei,
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_client_creation() {
        assert!(EmbeddingClient::new(&tei_config("http://localhost:8080")).is_ok());
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config = EmbeddingConfig {
            api_key: None,
            ..Default::default()
        };
        assert!(matches!(
            EmbeddingClient::new(&config),
            Err(EmbeddingError::MissingApiKey)
        ));
    }

    #[test]
    fn test_base_url_trimming() {
        let client = EmbeddingClient::new(&tei_config("http://localhost:11411/")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11411");
        assert_eq!(client.endpoint(), "http://localhost:11411/embed");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let mut config = tei_config("http://127.0.0.1:1");
        config.max_retries = 0;
        config.timeout_secs = 2;
        let client = EmbeddingClient::new(&config).unwrap();

        let result = client.embed("hello").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_hash_embedder_is_normalized_and_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("Hello world").await.unwrap();
        let b = embedder.embed("hello, WORLD!").await.unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_embedder_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed("  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(embedder.model(), "hash-16");
    }

    #[tokio::test]
    async fn test_create_provider_offline() {
        let provider = create_provider(&EmbeddingConfig::default(), true).unwrap();
        let vectors = provider
            .embed_batch(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 384);
    }
}
