//! Presidio adapter for PII analysis and anonymization.
//!
//! Talks to the two Presidio REST services:
//! - analyzer: `POST /analyze` returns detected entities
//! - anonymizer: `POST /anonymize` rewrites the text from those detections

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{get_health, post_json, AdapterError, Anonymizer, RecognizerResult};

const ANALYZER: &str = "presidio-analyzer";
const ANONYMIZER: &str = "presidio-anonymizer";

/// Presidio analyzer + anonymizer client
pub struct PresidioAnonymizer {
    analyzer_url: String,
    anonymizer_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
    language: &'a str,
    entities: &'a [String],
}

#[derive(Debug, Serialize)]
struct AnonymizeRequest<'a> {
    text: &'a str,
    analyzer_results: &'a [RecognizerResult],
}

#[derive(Debug, Deserialize)]
struct AnonymizeResponse {
    text: String,
}

impl PresidioAnonymizer {
    /// Create a client for the given analyzer and anonymizer base URLs
    pub fn new(analyzer_url: impl Into<String>, anonymizer_url: impl Into<String>) -> Self {
        Self {
            analyzer_url: analyzer_url.into().trim_end_matches('/').to_string(),
            anonymizer_url: anonymizer_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Run entity recognition only
    pub async fn analyze(
        &self,
        text: &str,
        entities: &[String],
        language: &str,
    ) -> Result<Vec<RecognizerResult>, AdapterError> {
        let request = AnalyzeRequest {
            text,
            language,
            entities,
        };
        let url = format!("{}/analyze", self.analyzer_url);
        post_json(&self.client, ANALYZER, &url, &request).await
    }
}

#[async_trait]
impl Anonymizer for PresidioAnonymizer {
    fn name(&self) -> &str {
        "presidio"
    }

    async fn anonymize(
        &self,
        text: &str,
        entities: &[String],
        language: &str,
    ) -> Result<String, AdapterError> {
        let results = self.analyze(text, entities, language).await?;
        debug!(detections = results.len(), "Presidio analysis complete");

        if results.is_empty() {
            return Ok(text.to_string());
        }

        let request = AnonymizeRequest {
            text,
            analyzer_results: &results,
        };
        let url = format!("{}/anonymize", self.anonymizer_url);
        let response: AnonymizeResponse = post_json(&self.client, ANONYMIZER, &url, &request).await?;
        Ok(response.text)
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        get_health(&self.client, ANALYZER, &format!("{}/health", self.analyzer_url)).await?;
        get_health(&self.client, ANONYMIZER, &format!("{}/health", self.anonymizer_url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_trimmed() {
        let presidio = PresidioAnonymizer::new("http://analyzer:3000/", "http://anonymizer:3000");
        assert_eq!(presidio.analyzer_url, "http://analyzer:3000");
        assert_eq!(presidio.anonymizer_url, "http://anonymizer:3000");
        assert_eq!(presidio.name(), "presidio");
    }

    #[test]
    fn test_analyze_request_shape() {
        let entities = vec!["PERSON".to_string()];
        let request = AnalyzeRequest {
            text: "Hi Bob",
            language: "en",
            entities: &entities,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "text": "Hi Bob", "language": "en", "entities": ["PERSON"] })
        );
    }

    // HTTP behavior is covered in tests/presidio_mock.rs
}
