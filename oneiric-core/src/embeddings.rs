//! Embedding backend — vector representations of dream content
//!
//! `EmbeddingBackend` abstracts over providers; the Gemini implementation
//! calls `embedContent` with retry, and `FallbackEmbeddingClient` degrades
//! to `Ok(None)` so a dream can be stored without a vector and backfilled
//! once the API recovers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

/// Default Gemini embedding dimensions
pub const GEMINI_DIMENSIONS: usize = 768;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Abstraction over embedding providers.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a dream's content. `None` means the backend deferred —
    /// store the dream without a vector and let the backfill worker retry.
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError>;

    /// Embed a lookup query. Backends with task-type hints use
    /// `RETRIEVAL_QUERY` here; the default just delegates to `embed()`.
    async fn embed_query(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        self.embed(text).await
    }

    /// Fixed dimensionality of every vector this backend produces.
    fn dimensions(&self) -> usize;

    /// Model identifier stored alongside each vector. Vectors are only
    /// comparable within one model name.
    fn model_name(&self) -> &str;
}

/// Task-type hint for the embedding API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    #[default]
    RetrievalDocument,
    RetrievalQuery,
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

/// Gemini embedding client configuration
#[derive(Debug, Clone)]
pub struct EmbeddingClientConfig {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl EmbeddingClientConfig {
    pub fn new(api_key: Option<String>, model: String, dimensions: usize) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            model,
            dimensions,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

// ============================================================================
// Wire format (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: ContentBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_type: Option<TaskType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ContentBlock {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: u16,
    message: String,
}

/// Pull `code`/`message` out of a Gemini error body, falling back to the
/// HTTP status and raw text when the body is not the documented shape.
fn decode_api_error(status: u16, body: String) -> (u16, String) {
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| (e.code, e.message))
        .unwrap_or((status, body))
}

// ============================================================================
// GeminiEmbeddingClient
// ============================================================================

/// Gemini `embedContent` client.
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingClient {
    client: Client,
    config: EmbeddingClientConfig,
    base_url: String,
}

impl GeminiEmbeddingClient {
    pub fn new(config: EmbeddingClientConfig) -> Result<Self, EmbeddingError> {
        Self::with_base_url(config, GEMINI_API_BASE.to_string())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        config: EmbeddingClientConfig,
        base_url: String,
    ) -> Result<Self, EmbeddingError> {
        if config.api_key.is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Embed dream content, retrying transient failures.
    pub async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_with_task(text, TaskType::RetrievalDocument).await
    }

    /// Embed with an explicit task-type hint.
    pub async fn embed_with_task(
        &self,
        text: &str,
        task_type: TaskType,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        Retry::spawn(retry_strategy, || self.embed_once(text, task_type))
            .await
            .map_err(|e| {
                tracing::error!(
                    attempts = self.config.max_retries,
                    error = %e,
                    "All embedding retry attempts failed"
                );
                EmbeddingError::RetryExhausted {
                    attempts: self.config.max_retries,
                }
            })
    }

    async fn embed_once(
        &self,
        text: &str,
        task_type: TaskType,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, self.config.model, self.config.api_key
        );

        let request = EmbedContentRequest {
            model: format!("models/{}", self.config.model),
            content: ContentBlock {
                parts: vec![TextPart {
                    text: text.to_string(),
                }],
            },
            task_type: Some(task_type),
            output_dimensionality: Some(self.config.dimensions),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = decode_api_error(status.as_u16(), body);
            tracing::error!(code = code, message = %message, "Gemini embedding API error");
            return Err(EmbeddingError::Api { code, message });
        }

        let parsed: EmbedContentResponse = response.json().await?;
        let values = parsed.embedding.values;

        if values.len() != self.config.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.config.dimensions,
                actual: values.len(),
            });
        }

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        self.embed_raw(text).await.map(Some)
    }

    async fn embed_query(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        self.embed_with_task(text, TaskType::RetrievalQuery)
            .await
            .map(Some)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// FallbackEmbeddingClient
// ============================================================================

/// Wraps `GeminiEmbeddingClient` so an API outage costs a vector, not a
/// journal entry: any error is logged and reported as `Ok(None)`.
pub struct FallbackEmbeddingClient {
    inner: GeminiEmbeddingClient,
}

impl FallbackEmbeddingClient {
    pub fn new(config: EmbeddingClientConfig) -> Result<Self, EmbeddingError> {
        Ok(Self {
            inner: GeminiEmbeddingClient::new(config)?,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(
        config: EmbeddingClientConfig,
        base_url: String,
    ) -> Result<Self, EmbeddingError> {
        Ok(Self {
            inner: GeminiEmbeddingClient::with_base_url(config, base_url)?,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for FallbackEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        match self.inner.embed_raw(text).await {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Embedding failed — storing dream without vector (similarity lookup deferred)"
                );
                Ok(None)
            }
        }
    }

    async fn embed_query(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        match self.inner.embed_with_task(text, TaskType::RetrievalQuery).await {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                tracing::warn!(error = %e, "Query embedding failed");
                Ok(None)
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DREAM: &str = "I dreamed the staircase kept growing new steps";

    fn config_with_retries(retries: usize) -> EmbeddingClientConfig {
        EmbeddingClientConfig {
            api_key: "test-api-key".to_string(),
            model: "gemini-embedding-001".to_string(),
            dimensions: GEMINI_DIMENSIONS,
            max_retries: retries,
            retry_delay_ms: 10,
        }
    }

    async fn gemini_stub() -> (MockServer, GeminiEmbeddingClient) {
        let server = MockServer::start().await;
        let client =
            GeminiEmbeddingClient::with_base_url(config_with_retries(3), server.uri()).unwrap();
        (server, client)
    }

    fn vector_of_dim(dim: usize) -> serde_json::Value {
        let values: Vec<f32> = (0..dim).map(|i| i as f32 / dim as f32).collect();
        serde_json::json!({ "embedding": { "values": values } })
    }

    fn api_error(code: u16, message: &str) -> serde_json::Value {
        serde_json::json!({ "error": { "code": code, "message": message } })
    }

    #[tokio::test]
    async fn test_document_embedding_sends_expected_request() {
        let (server, client) = gemini_stub().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-embedding-001:embedContent"))
            .and(body_json(serde_json::json!({
                "model": "models/gemini-embedding-001",
                "content": { "parts": [{ "text": DREAM }] },
                "taskType": "RETRIEVAL_DOCUMENT",
                "outputDimensionality": GEMINI_DIMENSIONS,
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(vector_of_dim(GEMINI_DIMENSIONS)),
            )
            .mount(&server)
            .await;

        let vector = client.embed_raw(DREAM).await.expect("embed_raw failed");
        assert_eq!(vector.len(), GEMINI_DIMENSIONS);
    }

    #[tokio::test]
    async fn test_lookup_embedding_sends_query_task_type() {
        let (server, client) = gemini_stub().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(vector_of_dim(GEMINI_DIMENSIONS)),
            )
            .mount(&server)
            .await;

        let result = client.embed_query("recurring staircase dreams").await.unwrap();
        assert!(result.is_some());

        let requests = server.received_requests().await.unwrap_or_default();
        let body = String::from_utf8_lossy(&requests.last().unwrap().body);
        assert!(body.contains("RETRIEVAL_QUERY"), "got: {}", body);
    }

    #[tokio::test]
    async fn test_persistent_api_failure_exhausts_retries() {
        let (server, client) = gemini_stub().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(api_error(500, "boom")))
            .mount(&server)
            .await;

        match client.embed_raw(DREAM).await {
            Err(EmbeddingError::RetryExhausted { attempts }) => assert_eq!(attempts, 3),
            other => panic!("Expected RetryExhausted, got: {:?}", other.map(|v| v.len())),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_once_then_succeeds() {
        let (server, client) = gemini_stub().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(api_error(429, "Rate limit exceeded")),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(vector_of_dim(GEMINI_DIMENSIONS)),
            )
            .mount(&server)
            .await;

        let vector = client.embed_raw(DREAM).await.expect("retry should recover");
        assert_eq!(vector.len(), GEMINI_DIMENSIONS);
    }

    #[tokio::test]
    async fn test_truncated_vector_is_rejected() {
        let (server, client) = gemini_stub().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vector_of_dim(12)))
            .mount(&server)
            .await;

        assert!(client.embed_raw(DREAM).await.is_err());
    }

    #[test]
    fn test_blank_api_key_is_rejected() {
        let mut config = config_with_retries(3);
        config.api_key = String::new();
        assert!(matches!(
            GeminiEmbeddingClient::new(config),
            Err(EmbeddingError::MissingApiKey)
        ));
    }

    #[test]
    fn test_decode_api_error_falls_back_to_raw_body() {
        let (code, message) = decode_api_error(502, "<html>bad gateway</html>".to_string());
        assert_eq!(code, 502);
        assert!(message.contains("bad gateway"));

        let (code, message) = decode_api_error(500, api_error(429, "slow down").to_string());
        assert_eq!(code, 429);
        assert_eq!(message, "slow down");
    }

    #[tokio::test]
    async fn test_fallback_turns_api_outage_into_none() {
        let server = MockServer::start().await;
        let fallback =
            FallbackEmbeddingClient::with_base_url(config_with_retries(1), server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(api_error(500, "boom")))
            .mount(&server)
            .await;

        let result = fallback.embed(DREAM).await.expect("fallback must not error");
        assert!(result.is_none(), "outage should defer, not fail");
    }

    #[tokio::test]
    async fn test_fallback_passes_vectors_through_on_success() {
        let server = MockServer::start().await;
        let fallback =
            FallbackEmbeddingClient::with_base_url(config_with_retries(3), server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(vector_of_dim(GEMINI_DIMENSIONS)),
            )
            .mount(&server)
            .await;

        let result = fallback.embed(DREAM).await.unwrap();
        assert_eq!(result.map(|v| v.len()), Some(GEMINI_DIMENSIONS));
        assert_eq!(fallback.model_name(), "gemini-embedding-001");
        assert_eq!(fallback.dimensions(), GEMINI_DIMENSIONS);
    }
}
