//! PII detection tool.
//!
//! The text is sent to a redaction backend. If the redacted text differs
//! from the input, the call fails with the redacted text as the fix and
//! one error span per removed run of characters.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::adapters::{AdapterError, Anonymizer};
use crate::validation::{reconcile_until, ValidationResult};

use super::{parse_arguments, Tool, ToolError};

/// General personal identifiers
pub const PII_PRESET: &[&str] = &[
    "EMAIL_ADDRESS",
    "PHONE_NUMBER",
    "DOMAIN_NAME",
    "IP_ADDRESS",
    "DATE_TIME",
    "LOCATION",
    "PERSON",
    "URL",
];

/// Sensitive financial and government identifiers
pub const SPI_PRESET: &[&str] = &[
    "CREDIT_CARD",
    "CRYPTO",
    "IBAN_CODE",
    "NRP",
    "MEDICAL_LICENSE",
    "US_BANK_NUMBER",
    "US_DRIVER_LICENSE",
    "US_ITIN",
    "US_PASSPORT",
    "US_SSN",
];

/// Preset names in lookup order
pub const PRESET_NAMES: &[&str] = &["pii", "spi"];

/// Look up a preset by name
pub fn preset(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "pii" => Some(PII_PRESET),
        "spi" => Some(SPI_PRESET),
        _ => None,
    }
}

/// Errors from PII detection
#[derive(Debug, Error)]
pub enum PiiError {
    #[error("`pii_entities` must be one of {valid:?} or a list of entity names, got '{name}'")]
    UnknownPreset { name: String, valid: Vec<String> },

    #[error(transparent)]
    Anonymizer(#[from] AdapterError),

    #[error("Span reconciliation failed: {0}")]
    Reconcile(#[from] tokio::task::JoinError),
}

/// Which entity types to detect
///
/// Deserializes from either a preset name (`"pii"`) or a list of entity
/// names (`["PERSON", "URL"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PiiEntities {
    Preset(String),
    Explicit(Vec<String>),
}

impl Default for PiiEntities {
    fn default() -> Self {
        Self::Preset("pii".to_string())
    }
}

impl PiiEntities {
    /// Resolve to a concrete list of entity names
    pub fn resolve(&self) -> Result<Vec<String>, PiiError> {
        match self {
            Self::Preset(name) => preset(name)
                .map(|entities| entities.iter().map(|e| e.to_string()).collect())
                .ok_or_else(|| PiiError::UnknownPreset {
                    name: name.clone(),
                    valid: PRESET_NAMES.iter().map(|n| n.to_string()).collect(),
                }),
            Self::Explicit(names) => Ok(names.clone()),
        }
    }
}

impl FromStr for PiiEntities {
    type Err = std::convert::Infallible;

    /// `pii`/`spi` (any lowercase word) is a preset; anything with a comma
    /// or in upper case is a list of entity names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let is_list = s.contains(',') || s.chars().any(|c| c.is_ascii_uppercase());
        if is_list {
            Ok(Self::Explicit(
                s.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect(),
            ))
        } else {
            Ok(Self::Preset(s.to_string()))
        }
    }
}

impl fmt::Display for PiiEntities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preset(name) => write!(f, "{}", name),
            Self::Explicit(names) => write!(f, "{}", names.join(",")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetectPiiArgs {
    query: String,
    #[serde(default)]
    pii_entities: Option<PiiEntities>,
}

/// PII detection tool
pub struct DetectPii {
    anonymizer: Arc<dyn Anonymizer>,
    default_entities: PiiEntities,
    language: String,
    diff_timeout: Option<Duration>,
}

impl DetectPii {
    /// Create the tool over a shared redaction backend
    pub fn new(anonymizer: Arc<dyn Anonymizer>) -> Self {
        Self {
            anonymizer,
            default_entities: PiiEntities::default(),
            language: "en".to_string(),
            diff_timeout: None,
        }
    }

    /// Entities used when a call does not name any
    pub fn with_default_entities(mut self, entities: PiiEntities) -> Self {
        self.default_entities = entities;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Stop searching for a minimal diff after `timeout`
    ///
    /// Past the deadline the rest of each changed region is reported as a
    /// single finding.
    pub fn with_diff_timeout(mut self, timeout: Duration) -> Self {
        self.diff_timeout = Some(timeout);
        self
    }

    /// Validate `value`, with per-call entities taking precedence
    #[instrument(skip(self, value, entities), fields(backend = self.anonymizer.name()))]
    pub async fn validate(
        &self,
        value: &str,
        entities: Option<&PiiEntities>,
    ) -> Result<ValidationResult, PiiError> {
        let entities = entities.unwrap_or(&self.default_entities);
        let entities_to_filter = entities.resolve()?;
        debug!(entities = %entities, count = entities_to_filter.len(), "Resolved PII entities");

        let anonymized = self
            .anonymizer
            .anonymize(value, &entities_to_filter, &self.language)
            .await?;

        if anonymized == value {
            return Ok(ValidationResult::Pass);
        }

        // The diff is CPU bound; keep it off the async workers
        let deadline = self.diff_timeout.map(|timeout| Instant::now() + timeout);
        let original = value.to_string();
        let modified = anonymized.clone();
        let error_spans =
            tokio::task::spawn_blocking(move || reconcile_until(&original, &modified, deadline)).await?;
        info!(spans = error_spans.len(), "PII detected");

        Ok(ValidationResult::Fail {
            error_message: format!("The following text in your response contains PII:\n{}", value),
            fix_value: anonymized,
            error_spans,
        })
    }
}

#[async_trait]
impl Tool for DetectPii {
    fn name(&self) -> &str {
        "detect_pii"
    }

    fn description(&self) -> &str {
        "Detect personally identifiable information in text. Fails with an anonymized \
         copy of the text and the flagged character ranges when PII is found."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to check"
                },
                "pii_entities": {
                    "description": "Preset name (\"pii\" or \"spi\") or a list of entity names",
                    "anyOf": [
                        { "type": "string", "enum": PRESET_NAMES },
                        { "type": "array", "items": { "type": "string" } }
                    ]
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, arguments: Value) -> Result<ValidationResult, ToolError> {
        let args: DetectPiiArgs = parse_arguments(arguments)?;

        if let Some(entities) = &args.pii_entities {
            entities
                .resolve()
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        }

        let result = self
            .validate(&args.query, args.pii_entities.as_ref())
            .await
            .context("PII detection failed")?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::PatternAnonymizer;

    fn tool() -> DetectPii {
        DetectPii::new(Arc::new(PatternAnonymizer::new()))
    }

    #[test]
    fn test_presets_resolve() {
        let pii = PiiEntities::Preset("pii".to_string()).resolve().unwrap();
        assert_eq!(pii.len(), 8);
        assert!(pii.contains(&"EMAIL_ADDRESS".to_string()));

        let spi = PiiEntities::Preset("spi".to_string()).resolve().unwrap();
        assert_eq!(spi.len(), 10);
        assert!(spi.contains(&"US_SSN".to_string()));
    }

    #[test]
    fn test_unknown_preset() {
        let err = PiiEntities::Preset("phi".to_string()).resolve().unwrap_err();
        assert!(matches!(err, PiiError::UnknownPreset { ref name, .. } if name == "phi"));
        assert!(err.to_string().contains("\"pii\""));
    }

    #[test]
    fn test_untagged_deserialization() {
        let preset: PiiEntities = serde_json::from_value(json!("spi")).unwrap();
        assert_eq!(preset, PiiEntities::Preset("spi".to_string()));

        let list: PiiEntities = serde_json::from_value(json!(["PERSON", "URL"])).unwrap();
        assert_eq!(
            list,
            PiiEntities::Explicit(vec!["PERSON".to_string(), "URL".to_string()])
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!("pii".parse::<PiiEntities>().unwrap(), PiiEntities::default());
        assert_eq!(
            "EMAIL_ADDRESS, URL".parse::<PiiEntities>().unwrap(),
            PiiEntities::Explicit(vec!["EMAIL_ADDRESS".to_string(), "URL".to_string()])
        );
        assert_eq!(
            "PERSON".parse::<PiiEntities>().unwrap(),
            PiiEntities::Explicit(vec!["PERSON".to_string()])
        );
    }

    #[tokio::test]
    async fn test_clean_text_passes() {
        let result = tool().validate("nothing to see here", None).await.unwrap();
        assert!(result.is_pass());
    }

    #[tokio::test]
    async fn test_email_fails_with_span() {
        let text = "Contact: alice@example.com today";
        let result = tool().validate(text, None).await.unwrap();

        match result {
            ValidationResult::Fail {
                error_message,
                fix_value,
                error_spans,
            } => {
                assert!(error_message.ends_with(text));
                assert_eq!(fix_value, "Contact: <EMAIL_ADDRESS> today");
                assert_eq!(error_spans.len(), 1);
                assert_eq!(error_spans[0].reason, "PII detected in alice@example.com");
                assert_eq!((error_spans[0].start(), error_spans[0].end()), (9, 26));
            }
            ValidationResult::Pass => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_call_rejects_unknown_preset() {
        let err = tool()
            .call(json!({ "query": "x", "pii_entities": "phi" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_call_with_explicit_entities() {
        let result = tool()
            .call(json!({ "query": "host 10.0.0.1", "pii_entities": ["EMAIL_ADDRESS"] }))
            .await
            .unwrap();
        assert!(result.is_pass());
    }
}
