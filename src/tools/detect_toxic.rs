//! Toxicity detection tool.
//!
//! Renders the query into a prompt template and asks a guard model for a
//! verdict. A reply containing the fail marker fails validation with the
//! reply as the error message.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::adapters::{GenerateOptions, GenerateRequest, OllamaClient, OllamaError};
use crate::validation::ValidationResult;

use super::{parse_arguments, Tool, ToolError};

/// Built-in prompt template
pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/detect_toxic.yaml");

/// Placeholder replaced by the query
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Verdict text that marks a failed check ("not passed")
pub const DEFAULT_FAIL_MARKER: &str = "未通过";

pub const DEFAULT_MODEL: &str = "guard";

/// Token budget for the verdict
pub const DEFAULT_MAX_TOKENS: u32 = 10;

#[derive(Debug, Deserialize)]
struct TemplateFile {
    #[serde(default)]
    check_prompt: Option<String>,
}

/// Parse a template document, returning its `check_prompt` (empty if absent)
pub fn parse_prompt_template(yaml: &str) -> Result<String> {
    let file: Option<TemplateFile> =
        serde_yaml::from_str(yaml).context("Failed to parse prompt template YAML")?;
    Ok(file.and_then(|f| f.check_prompt).unwrap_or_default())
}

/// Load a template file
///
/// A missing or unparsable file yields an empty template; the problem is
/// logged rather than returned.
pub fn load_prompt_template(path: &Path) -> String {
    if !path.exists() {
        warn!(path = %path.display(), "Template file not found");
        return String::new();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read template file");
            return String::new();
        }
    };

    match parse_prompt_template(&content) {
        Ok(template) => template,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Error parsing template YAML");
            String::new()
        }
    }
}

/// Substitute the query into a template
pub fn render_prompt(template: &str, query: &str) -> String {
    template.replace(QUERY_PLACEHOLDER, query)
}

#[derive(Debug, Deserialize)]
struct DetectToxicArgs {
    query: String,
}

/// Toxicity detection tool
pub struct DetectToxic {
    llm: Arc<OllamaClient>,
    model: String,
    template: String,
    fail_marker: String,
    max_tokens: u32,
}

impl DetectToxic {
    /// Create the tool with the built-in template and the `guard` model
    pub fn new(llm: Arc<OllamaClient>) -> Self {
        let template = parse_prompt_template(DEFAULT_TEMPLATE).unwrap_or_default();
        Self {
            llm,
            model: DEFAULT_MODEL.to_string(),
            template,
            fail_marker: DEFAULT_FAIL_MARKER.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_fail_marker(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = marker.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Validate a query through the prompt template
    pub async fn validate_query(&self, query: &str) -> Result<ValidationResult, OllamaError> {
        let prompt = render_prompt(&self.template, query);
        self.validate_prompt(&prompt).await
    }

    /// Validate with a prompt sent as-is
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    pub async fn validate_prompt(&self, prompt: &str) -> Result<ValidationResult, OllamaError> {
        let request = GenerateRequest::new(&self.model, prompt).with_options(GenerateOptions {
            num_predict: Some(self.max_tokens),
            temperature: None,
        });

        let reply = self.llm.generate(&request).await?;

        if reply.response.contains(&self.fail_marker) {
            info!(verdict = %reply.response.trim(), "Query flagged");
            return Ok(ValidationResult::fail(reply.response, ""));
        }
        Ok(ValidationResult::Pass)
    }
}

#[async_trait]
impl Tool for DetectToxic {
    fn name(&self) -> &str {
        "detect_toxic"
    }

    fn description(&self) -> &str {
        "Detect toxic or harmful content in text using a guard model. \
         Fails with the model's verdict when the text is flagged."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to check"
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, arguments: Value) -> Result<ValidationResult, ToolError> {
        let args: DetectToxicArgs = parse_arguments(arguments)?;
        let result = self
            .validate_query(&args.query)
            .await
            .context("Toxicity detection failed")?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_template_has_placeholder() {
        let template = parse_prompt_template(DEFAULT_TEMPLATE).unwrap();
        assert!(template.contains(QUERY_PLACEHOLDER));
        assert!(template.contains(DEFAULT_FAIL_MARKER));
    }

    #[test]
    fn test_render_prompt() {
        assert_eq!(render_prompt("Check: {query}!", "hi"), "Check: hi!");
        assert_eq!(render_prompt("no slot", "hi"), "no slot");
    }

    #[test]
    fn test_missing_key_is_empty() {
        assert_eq!(parse_prompt_template("other: value").unwrap(), "");
        assert_eq!(parse_prompt_template("").unwrap(), "");
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(parse_prompt_template("check_prompt: [unclosed").is_err());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        assert_eq!(load_prompt_template(&temp.path().join("nope.yaml")), "");
    }

    #[test]
    fn test_load_template_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("template.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "check_prompt: \"Is this ok? {{query}}\"").unwrap();

        assert_eq!(load_prompt_template(&path), "Is this ok? {query}");
    }

    #[test]
    fn test_builder() {
        let tool = DetectToxic::new(Arc::new(OllamaClient::new("http://localhost:11434")))
            .with_model("llama-guard")
            .with_template("T {query}");
        assert_eq!(tool.model, "llama-guard");
        assert_eq!(tool.template(), "T {query}");
        assert_eq!(tool.fail_marker, DEFAULT_FAIL_MARKER);
    }

    // Model round trips are covered in tests/ollama_mock.rs
}
