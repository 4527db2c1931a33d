//! Adapter interfaces for external systems.
//!
//! Adapters wrap the services the tools delegate to:
//! - Redaction backends behind the [`Anonymizer`] trait (Presidio, a hosted
//!   inference endpoint, or the built-in pattern recognizer)
//! - The Ollama language-model server

pub mod hub;
pub mod ollama;
pub mod patterns;
pub mod presidio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use hub::HubAnonymizer;
pub use ollama::{GenerateOptions, GenerateRequest, GenerateResponse, ModelInfo, OllamaClient, OllamaError};
pub use patterns::PatternAnonymizer;
pub use presidio::PresidioAnonymizer;

/// A detected entity in analyzed text
///
/// Offsets are character offsets, the convention Presidio uses on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizerResult {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
}

/// Errors from redaction backends
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Request to {service} failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to decode {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("Invalid anonymizer configuration: {0}")]
    Config(String),
}

/// Trait for redaction backends
///
/// Implementations analyze `text` for the requested entity types and
/// return the text with every detection rewritten. Returning `text`
/// unchanged means nothing was found.
#[async_trait]
pub trait Anonymizer: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Analyze and anonymize text
    async fn anonymize(
        &self,
        text: &str,
        entities: &[String],
        language: &str,
    ) -> Result<String, AdapterError>;

    /// Health check (for HTTP backends)
    async fn health_check(&self) -> Result<(), AdapterError>;
}

/// Send a JSON POST and decode a JSON reply, mapping failures per service
pub(crate) async fn post_json<B, T>(
    client: &reqwest::Client,
    service: &'static str,
    url: &str,
    body: &B,
) -> Result<T, AdapterError>
where
    B: Serialize + ?Sized,
    T: serde::de::DeserializeOwned,
{
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|source| AdapterError::Request { service, source })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AdapterError::Status {
            service,
            status: status.as_u16(),
            body,
        });
    }

    response.json().await.map_err(|e| AdapterError::Decode {
        service,
        message: e.to_string(),
    })
}

/// GET a health endpoint and require a success status
pub(crate) async fn get_health(
    client: &reqwest::Client,
    service: &'static str,
    url: &str,
) -> Result<(), AdapterError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| AdapterError::Request { service, source })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AdapterError::Status {
            service,
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}
