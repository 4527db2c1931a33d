//! Validation result types
//!
//! These types are the JSON payload returned by every tool call.

use serde::{Deserialize, Serialize};

/// A character range in the validated text
///
/// Offsets count Unicode scalar values, not bytes, so a consumer can index
/// the original string the same way it was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Range {
    /// First flagged character (inclusive)
    pub start: usize,
    /// One past the last flagged character
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of characters covered
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A flagged range with a human-readable reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(flatten)]
    pub range: Range,
    pub reason: String,
}

impl Finding {
    pub fn new(range: Range, reason: impl Into<String>) -> Self {
        Self {
            range,
            reason: reason.into(),
        }
    }

    pub fn start(&self) -> usize {
        self.range.start
    }

    pub fn end(&self) -> usize {
        self.range.end
    }
}

/// Outcome of validating a piece of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidationResult {
    /// Nothing was flagged
    Pass,

    /// The text was flagged
    Fail {
        /// Message shown to the caller
        error_message: String,
        /// Suggested replacement for the text (may be empty)
        fix_value: String,
        /// Flagged ranges of the original text
        #[serde(default)]
        error_spans: Vec<Finding>,
    },
}

impl ValidationResult {
    /// Build a failure without spans
    pub fn fail(error_message: impl Into<String>, fix_value: impl Into<String>) -> Self {
        Self::Fail {
            error_message: error_message.into(),
            fix_value: fix_value.into(),
            error_spans: Vec::new(),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Flagged spans (empty on pass)
    pub fn error_spans(&self) -> &[Finding] {
        match self {
            Self::Pass => &[],
            Self::Fail { error_spans, .. } => error_spans,
        }
    }

    /// JSON form returned over the tool boundary
    pub fn to_value(&self) -> serde_json::Value {
        // Serializing this enum cannot fail: all fields are strings and integers.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pass_serialization() {
        assert_eq!(ValidationResult::Pass.to_value(), json!({ "outcome": "pass" }));
    }

    #[test]
    fn test_fail_serialization_flattens_spans() {
        let result = ValidationResult::Fail {
            error_message: "bad".to_string(),
            fix_value: "<EMAIL>".to_string(),
            error_spans: vec![Finding::new(Range::new(0, 7), "PII detected in a@b.com")],
        };

        assert_eq!(
            result.to_value(),
            json!({
                "outcome": "fail",
                "error_message": "bad",
                "fix_value": "<EMAIL>",
                "error_spans": [{ "start": 0, "end": 7, "reason": "PII detected in a@b.com" }],
            })
        );
    }

    #[test]
    fn test_fail_without_spans_deserializes() {
        let value = json!({ "outcome": "fail", "error_message": "no", "fix_value": "" });
        let result: ValidationResult = serde_json::from_value(value).unwrap();
        assert_eq!(result, ValidationResult::fail("no", ""));
        assert!(!result.is_pass());
        assert!(result.error_spans().is_empty());
    }

    #[test]
    fn test_range_len() {
        let range = Range::new(5, 11);
        assert_eq!(range.len(), 6);
        assert!(!range.is_empty());
    }
}
