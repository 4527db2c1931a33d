//! Ollama client for locally hosted language models.
//!
//! Endpoints live under `{base_url}/api/`. Connection failures and
//! gateway errors (502/503/504) are retried with exponential backoff;
//! every other error status fails immediately.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::RetryPolicy;

/// Errors from the Ollama API
#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode API response: {0}")]
    Decode(String),
}

/// Sampling options for a generate call
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerateOptions {
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Body of `POST /api/generate`
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

impl GenerateRequest {
    /// Non-streaming request with no options
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
            options: None,
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Reply of a non-streaming generate call
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

/// A model installed on the server
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// Ollama HTTP client
pub struct OllamaClient {
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client for `base_url` with the default retry policy
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            retry: RetryPolicy::default(),
            client: reqwest::Client::new(),
        }
    }

    /// Send `Authorization: Bearer <key>` on every request
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build API URL
    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Make an API call, retrying transient failures
    async fn call_api(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, OllamaError> {
        let url = self.api_url(endpoint);
        let mut attempt = 1;

        loop {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    if RetryPolicy::is_retryable_status(status) && self.retry.should_retry(attempt) {
                        let delay = self.retry.delay_for_attempt(attempt);
                        warn!(%url, status, attempt, ?delay, "Transient API error, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    let body = response.text().await.unwrap_or_default();
                    return Err(OllamaError::Status { status, body });
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(%url, error = %e, attempt, ?delay, "API unreachable, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(OllamaError::Request(e)),
            }
        }
    }

    /// Generate a completion (non-streaming)
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, OllamaError> {
        let body = serde_json::to_value(request).map_err(|e| OllamaError::Decode(e.to_string()))?;
        let response = self.call_api(Method::POST, "generate", Some(&body)).await?;

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OllamaError::Decode(e.to_string()))?;
        debug!(chars = reply.response.chars().count(), "Generation complete");
        Ok(reply)
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, OllamaError> {
        let response = self.call_api(Method::GET, "tags", None).await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| OllamaError::Decode(e.to_string()))?;
        Ok(tags.models)
    }

    /// Get server version
    pub async fn version(&self) -> Result<String, OllamaError> {
        let response = self.call_api(Method::GET, "version", None).await?;
        let version: VersionResponse = response
            .json()
            .await
            .map_err(|e| OllamaError::Decode(e.to_string()))?;
        Ok(version.version)
    }

    /// Health check: the server answers its version endpoint
    pub async fn health_check(&self) -> Result<(), OllamaError> {
        self.version().await.map(|_| ())
    }
}
