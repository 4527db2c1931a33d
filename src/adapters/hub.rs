//! Hosted inference endpoint for PII anonymization.
//!
//! The endpoint speaks the v2 inference protocol: the text and the entity
//! list go in as two BYTES tensors, the anonymized text comes back as the
//! first element of the first output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{post_json, AdapterError, Anonymizer};

const SERVICE: &str = "inference-hub";

/// Remote anonymizer client
pub struct HubAnonymizer {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: Vec<InferenceTensor<'a>>,
}

#[derive(Debug, Serialize)]
struct InferenceTensor<'a> {
    name: &'static str,
    shape: [usize; 1],
    data: Vec<&'a str>,
    datatype: &'static str,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    outputs: Vec<InferenceOutput>,
}

#[derive(Debug, Deserialize)]
struct InferenceOutput {
    #[serde(default)]
    data: Vec<Value>,
}

impl HubAnonymizer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    fn build_request<'a>(text: &'a str, entities: &'a [String]) -> InferenceRequest<'a> {
        InferenceRequest {
            inputs: vec![
                InferenceTensor {
                    name: "text",
                    shape: [1],
                    data: vec![text],
                    datatype: "BYTES",
                },
                InferenceTensor {
                    name: "pii_entities",
                    shape: [entities.len()],
                    data: entities.iter().map(String::as_str).collect(),
                    datatype: "BYTES",
                },
            ],
        }
    }
}

#[async_trait]
impl Anonymizer for HubAnonymizer {
    fn name(&self) -> &str {
        "hub"
    }

    async fn anonymize(
        &self,
        text: &str,
        entities: &[String],
        _language: &str,
    ) -> Result<String, AdapterError> {
        let request = Self::build_request(text, entities);
        let response: InferenceResponse =
            post_json(&self.client, SERVICE, &self.endpoint, &request).await?;

        response
            .outputs
            .first()
            .and_then(|output| output.data.first())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AdapterError::Decode {
                service: SERVICE,
                message: "missing outputs[0].data[0]".to_string(),
            })
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        // The v2 protocol has no fixed health route; a round trip is the check
        self.anonymize("", &[], "en").await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body() {
        let entities = vec!["PERSON".to_string(), "URL".to_string()];
        let request = HubAnonymizer::build_request("hello", &entities);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "inputs": [
                    { "name": "text", "shape": [1], "data": ["hello"], "datatype": "BYTES" },
                    { "name": "pii_entities", "shape": [2], "data": ["PERSON", "URL"], "datatype": "BYTES" },
                ]
            })
        );
    }
}
