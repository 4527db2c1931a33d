//! Moderation tools exposed to clients.
//!
//! Each tool takes JSON arguments with a required `query` string and
//! returns a [`ValidationResult`]:
//! - `detect_pii`: redacts PII through an [`Anonymizer`](crate::adapters::Anonymizer)
//!   and reports the redacted spans
//! - `detect_toxic`: asks a guard model whether the query is acceptable

pub mod detect_pii;
pub mod detect_toxic;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::validation::ValidationResult;

pub use detect_pii::{DetectPii, PiiEntities, PiiError};
pub use detect_toxic::DetectToxic;

/// Name of the argument every tool validates
pub const QUERY_ARGUMENT: &str = "query";

/// Errors from a tool call
#[derive(Debug, Error)]
pub enum ToolError {
    /// The arguments did not match the tool's input schema
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran but could not produce a result
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Trait for moderation tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as listed to clients
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn input_schema(&self) -> Value;

    /// Run the tool
    async fn call(&self, arguments: Value) -> Result<ValidationResult, ToolError>;
}

/// Deserialize tool arguments, mapping failures to `InvalidArguments`
pub(crate) fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Registered tools, in registration order
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool; a tool with the same name is replaced
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "echo"
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn call(&self, _arguments: Value) -> Result<ValidationResult, ToolError> {
            Ok(ValidationResult::Pass)
        }
    }

    #[test]
    fn test_registry_keeps_order_and_replaces() {
        let registry = ToolRegistry::new()
            .with(Arc::new(Echo("b")))
            .with(Arc::new(Echo("a")))
            .with(Arc::new(Echo("b")));

        let names: Vec<&str> = registry.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(registry.get("a").is_some());
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn test_parse_arguments_error() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Args {
            query: String,
        }

        let err = parse_arguments::<Args>(json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(msg) if msg.contains("query")));
    }
}
