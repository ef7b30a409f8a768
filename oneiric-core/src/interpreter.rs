//! Interpretation client — LLM-derived analysis of a dream entry
//!
//! Thin prompt-construction wrapper around the Gemini `generateContent`
//! API. The model is asked for strict JSON; replies wrapped in Markdown
//! code fences are unwrapped before deserialization.

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::InterpreterConfig;

/// AI-derived fields of a dream, populated once at creation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DreamAnalysis {
    pub interpretation: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub emotions: Vec<String>,
    #[serde(default)]
    pub themes: Vec<String>,
}

#[derive(Error, Debug)]
pub enum InterpreterError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Empty completion in response")]
    EmptyCompletion,

    #[error("Malformed analysis JSON: {0}")]
    MalformedAnalysis(#[from] serde_json::Error),

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GenerateContent>,
}

#[derive(Debug, Serialize)]
struct GenerateContent {
    parts: Vec<GeneratePart>,
}

#[derive(Debug, Serialize)]
struct GeneratePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiInterpreter
// ============================================================================

/// Gemini text-completion client for dream interpretation.
#[derive(Debug, Clone)]
pub struct GeminiInterpreter {
    client: Client,
    api_key: String,
    model: String,
    max_retries: usize,
    retry_delay_ms: u64,
    base_url: String,
}

impl GeminiInterpreter {
    pub fn new(config: &InterpreterConfig, api_key: String) -> Result<Self, InterpreterError> {
        Self::with_base_url(
            config,
            api_key,
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
        )
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        config: &InterpreterConfig,
        api_key: String,
        base_url: String,
    ) -> Result<Self, InterpreterError> {
        if api_key.is_empty() {
            return Err(InterpreterError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
            base_url,
        })
    }

    /// Interpret a dream entry, retrying transient API failures.
    pub async fn analyze(&self, content: &str) -> Result<DreamAnalysis, InterpreterError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries);

        let result = Retry::spawn(retry_strategy, || self.analyze_once(content)).await;

        match result {
            Ok(analysis) => Ok(analysis),
            Err(e) => {
                tracing::error!(
                    attempts = self.max_retries,
                    error = %e,
                    "All interpretation retry attempts failed"
                );
                Err(InterpreterError::RetryExhausted {
                    attempts: self.max_retries,
                })
            }
        }
    }

    async fn analyze_once(&self, content: &str) -> Result<DreamAnalysis, InterpreterError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![GenerateContent {
                parts: vec![GeneratePart {
                    text: build_prompt(content),
                }],
            }],
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini completion API error");

            return Err(InterpreterError::Api { code, message });
        }

        let body: GenerateResponse = response.json().await?;

        let text = body
            .candidates
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .and_then(|mut p| p.drain(..).next())
            .and_then(|p| p.text)
            .ok_or(InterpreterError::EmptyCompletion)?;

        parse_analysis(&text)
    }
}

fn build_prompt(content: &str) -> String {
    format!(
        "You are a thoughtful dream interpreter. Analyze the dream below and \
         respond with strict JSON only, using this shape:\n\
         {{\"interpretation\": string, \"symbols\": [string], \
         \"emotions\": [string], \"themes\": [string]}}\n\
         Keep symbols, emotions and themes to short lowercase labels.\n\n\
         Dream:\n{}",
        content
    )
}

/// Deserialize the model's reply, tolerating Markdown code fences.
pub fn parse_analysis(text: &str) -> Result<DreamAnalysis, InterpreterError> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("fence regex")
    });

    let stripped = match fence.captures(text) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(text),
        None => text.trim(),
    };

    Ok(serde_json::from_str(stripped)?)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> InterpreterConfig {
        InterpreterConfig {
            model: "gemini-2.0-flash".to_string(),
            max_retries: 2,
            retry_delay_ms: 10,
        }
    }

    fn completion_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [
                { "content": { "parts": [{ "text": text }] } }
            ]
        })
    }

    const ANALYSIS_JSON: &str = r#"{
        "interpretation": "Flight often reflects a desire for freedom.",
        "symbols": ["flying", "water"],
        "emotions": ["joy"],
        "themes": ["freedom"]
    }"#;

    #[test]
    fn test_parse_analysis_plain_json() {
        let a = parse_analysis(ANALYSIS_JSON).unwrap();
        assert_eq!(a.symbols, vec!["flying", "water"]);
        assert_eq!(a.emotions, vec!["joy"]);
    }

    #[test]
    fn test_parse_analysis_strips_code_fence() {
        let fenced = format!("```json\n{}\n```", ANALYSIS_JSON);
        let a = parse_analysis(&fenced).unwrap();
        assert_eq!(a.themes, vec!["freedom"]);
    }

    #[test]
    fn test_parse_analysis_strips_bare_fence() {
        let fenced = format!("```\n{}\n```", ANALYSIS_JSON);
        assert!(parse_analysis(&fenced).is_ok());
    }

    #[test]
    fn test_parse_analysis_missing_arrays_default_empty() {
        let a = parse_analysis(r#"{"interpretation": "short"}"#).unwrap();
        assert!(a.symbols.is_empty());
        assert!(a.emotions.is_empty());
        assert!(a.themes.is_empty());
    }

    #[test]
    fn test_parse_analysis_rejects_prose() {
        assert!(parse_analysis("Sorry, I cannot interpret that.").is_err());
    }

    #[tokio::test]
    async fn test_analyze_posts_prompt_and_parses_reply() {
        let mock_server = MockServer::start().await;
        let client = GeminiInterpreter::with_base_url(
            &test_config(),
            "test-api-key".to_string(),
            mock_server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(ANALYSIS_JSON)))
            .mount(&mock_server)
            .await;

        let analysis = client.analyze("I was flying over the ocean").await.unwrap();
        assert_eq!(analysis.symbols, vec!["flying", "water"]);

        let requests = mock_server.received_requests().await.unwrap_or_default();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("I was flying over the ocean"));
        assert!(body.contains("strict JSON"));
    }

    #[tokio::test]
    async fn test_analyze_retries_then_fails_with_retry_exhausted() {
        let mock_server = MockServer::start().await;
        let client = GeminiInterpreter::with_base_url(
            &test_config(),
            "test-api-key".to_string(),
            mock_server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "code": 500, "message": "Internal server error" }
            })))
            .mount(&mock_server)
            .await;

        let result = client.analyze("a dream").await;
        assert!(matches!(
            result,
            Err(InterpreterError::RetryExhausted { attempts: 2 })
        ));
    }

    #[tokio::test]
    async fn test_analyze_empty_candidates_is_error() {
        let mock_server = MockServer::start().await;
        let client = GeminiInterpreter::with_base_url(
            &test_config(),
            "test-api-key".to_string(),
            mock_server.uri(),
        )
        .unwrap();

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&mock_server)
            .await;

        assert!(client.analyze("a dream").await.is_err());
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let result = GeminiInterpreter::new(&test_config(), String::new());
        assert!(matches!(result, Err(InterpreterError::MissingApiKey)));
    }
}
