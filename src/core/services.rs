//! Service wiring.
//!
//! Builds the backend clients and tools from a resolved configuration
//! and hands them to the MCP server.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::adapters::{
    AdapterError, Anonymizer, HubAnonymizer, OllamaClient, PatternAnonymizer, PresidioAnonymizer,
};
use crate::config::{PiiBackend, ResolvedConfig};
use crate::mcp::ToolServer;
use crate::tools::detect_toxic::load_prompt_template;
use crate::tools::{DetectPii, DetectToxic, ToolRegistry};

/// Backend clients shared by the tools
pub struct Services {
    pub anonymizer: Arc<dyn Anonymizer>,
    pub llm: Arc<OllamaClient>,
}

impl Services {
    /// Build clients for the configured backends
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let anonymizer = build_anonymizer(config)?;
        let llm = OllamaClient::new(&config.toxic.base_url)
            .with_api_key(config.toxic.api_key.clone())
            .with_retry_policy(config.toxic.retry.clone());

        info!(
            pii_backend = anonymizer.name(),
            llm = %llm.base_url(),
            "Services configured"
        );

        Ok(Self {
            anonymizer,
            llm: Arc::new(llm),
        })
    }

    pub fn detect_pii(&self, config: &ResolvedConfig) -> DetectPii {
        DetectPii::new(Arc::clone(&self.anonymizer))
            .with_default_entities(config.pii.default_entities.clone())
            .with_language(config.pii.language.clone())
            .with_diff_timeout(config.safety.tool_timeout())
    }

    pub fn detect_toxic(&self, config: &ResolvedConfig) -> DetectToxic {
        let mut tool = DetectToxic::new(Arc::clone(&self.llm))
            .with_model(config.toxic.model.clone())
            .with_fail_marker(config.toxic.fail_marker.clone())
            .with_max_tokens(config.toxic.max_tokens);

        if let Some(path) = &config.toxic.template {
            tool = tool.with_template(load_prompt_template(path));
        }
        tool
    }

    /// Registry with both moderation tools
    pub fn tool_registry(&self, config: &ResolvedConfig) -> ToolRegistry {
        ToolRegistry::new()
            .with(Arc::new(self.detect_pii(config)))
            .with(Arc::new(self.detect_toxic(config)))
    }

    pub fn tool_server(&self, config: &ResolvedConfig) -> ToolServer {
        ToolServer::new(self.tool_registry(config), config.safety.clone())
    }

    /// Probe both backends, logging any that are unreachable
    ///
    /// Returns true when everything answered.
    pub async fn check_backends(&self) -> bool {
        let mut healthy = true;

        if let Err(e) = self.anonymizer.health_check().await {
            warn!(backend = self.anonymizer.name(), error = %e, "PII backend unavailable");
            healthy = false;
        }
        if let Err(e) = self.llm.health_check().await {
            warn!(llm = %self.llm.base_url(), error = %e, "LLM backend unavailable");
            healthy = false;
        }

        healthy
    }
}

fn build_anonymizer(config: &ResolvedConfig) -> Result<Arc<dyn Anonymizer>, AdapterError> {
    let anonymizer: Arc<dyn Anonymizer> = match config.pii.backend {
        PiiBackend::Presidio => Arc::new(PresidioAnonymizer::new(
            &config.pii.analyzer_url,
            &config.pii.anonymizer_url,
        )),
        PiiBackend::Hub => {
            let url = config.pii.hub_url.as_deref().ok_or_else(|| {
                AdapterError::Config(
                    "hub backend selected but no hub URL configured (set FIREWALL_HUB_URL)"
                        .to_string(),
                )
            })?;
            Arc::new(HubAnonymizer::new(url))
        }
        PiiBackend::Patterns => Arc::new(PatternAnonymizer::new()),
    };
    Ok(anonymizer)
}
