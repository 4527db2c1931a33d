//! Configuration for the firewall server.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (applied by the CLI)
//! 2. Environment variables (FIREWALL_*)
//! 3. Config file (.firewall/config.yaml)
//! 4. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .firewall/config.yaml
//! - Paths in config file are relative to the project root (the parent of .firewall/)

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{RetryPolicy, SafetyLimits};
use crate::tools::PiiEntities;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_ANALYZER_URL: &str = "http://localhost:5002";
pub const DEFAULT_ANONYMIZER_URL: &str = "http://localhost:5001";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub pii: PiiSection,
    #[serde(default)]
    pub toxic: ToxicSection,
    #[serde(default)]
    pub safety: Option<SafetyLimits>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PiiSection {
    pub backend: Option<PiiBackend>,
    pub language: Option<String>,
    pub default_entities: Option<PiiEntities>,
    pub analyzer_url: Option<String>,
    pub anonymizer_url: Option<String>,
    pub hub_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToxicSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Prompt template file (relative to project root)
    pub template: Option<String>,
    pub fail_marker: Option<String>,
    pub max_tokens: Option<u32>,
    pub retry: Option<RetryPolicy>,
}

/// Which redaction backend detect_pii uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiBackend {
    /// Presidio analyzer + anonymizer services
    #[default]
    Presidio,
    /// Hosted v2 inference endpoint
    Hub,
    /// Built-in regex recognizer
    Patterns,
}

impl FromStr for PiiBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "presidio" => Ok(Self::Presidio),
            "hub" => Ok(Self::Hub),
            "patterns" => Ok(Self::Patterns),
            other => anyhow::bail!(
                "Unknown PII backend '{}' (expected presidio, hub or patterns)",
                other
            ),
        }
    }
}

impl fmt::Display for PiiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Presidio => "presidio",
            Self::Hub => "hub",
            Self::Patterns => "patterns",
        };
        write!(f, "{}", name)
    }
}

/// Resolved PII settings
#[derive(Debug, Clone)]
pub struct PiiSettings {
    pub backend: PiiBackend,
    pub language: String,
    pub default_entities: PiiEntities,
    pub analyzer_url: String,
    pub anonymizer_url: String,
    pub hub_url: Option<String>,
}

/// Resolved toxicity settings
#[derive(Debug, Clone)]
pub struct ToxicSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Template override; the built-in template is used when unset
    pub template: Option<PathBuf>,
    pub fail_marker: String,
    pub max_tokens: u32,
    pub retry: RetryPolicy,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub host: String,
    pub port: u16,
    pub pii: PiiSettings,
    pub toxic: ToxicSettings,
    pub safety: SafetyLimits,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".firewall").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge a parsed config file with environment lookups
///
/// `env` returns the value of an environment variable, if set.
pub fn resolve(
    file: ConfigFile,
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    // Base directory is the parent of .firewall/ (i.e., grandparent of config.yaml)
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let host = env("FIREWALL_HOST")
        .or(file.server.host)
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match env("FIREWALL_PORT") {
        Some(port) => port
            .parse()
            .with_context(|| format!("FIREWALL_PORT is not a valid port: {}", port))?,
        None => file.server.port.unwrap_or(DEFAULT_PORT),
    };

    let backend = match env("FIREWALL_PII_BACKEND") {
        Some(backend) => backend.parse()?,
        None => file.pii.backend.unwrap_or_default(),
    };

    let pii = PiiSettings {
        backend,
        language: file.pii.language.unwrap_or_else(|| "en".to_string()),
        default_entities: file.pii.default_entities.unwrap_or_default(),
        analyzer_url: env("FIREWALL_PRESIDIO_ANALYZER_URL")
            .or(file.pii.analyzer_url)
            .unwrap_or_else(|| DEFAULT_ANALYZER_URL.to_string()),
        anonymizer_url: env("FIREWALL_PRESIDIO_ANONYMIZER_URL")
            .or(file.pii.anonymizer_url)
            .unwrap_or_else(|| DEFAULT_ANONYMIZER_URL.to_string()),
        hub_url: env("FIREWALL_HUB_URL").or(file.pii.hub_url),
    };

    let toxic = ToxicSettings {
        base_url: env("FIREWALL_OLLAMA_URL")
            .or(file.toxic.base_url)
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
        api_key: env("FIREWALL_OLLAMA_API_KEY").or(file.toxic.api_key),
        model: env("FIREWALL_MODEL")
            .or(file.toxic.model)
            .unwrap_or_else(|| crate::tools::detect_toxic::DEFAULT_MODEL.to_string()),
        template: file
            .toxic
            .template
            .map(|template| resolve_path(&base_dir, &template)),
        fail_marker: file
            .toxic
            .fail_marker
            .unwrap_or_else(|| crate::tools::detect_toxic::DEFAULT_FAIL_MARKER.to_string()),
        max_tokens: file
            .toxic
            .max_tokens
            .unwrap_or(crate::tools::detect_toxic::DEFAULT_MAX_TOKENS),
        retry: file.toxic.retry.unwrap_or_default(),
    };

    Ok(ResolvedConfig {
        host,
        port,
        pii,
        toxic,
        safety: file.safety.unwrap_or_default(),
        config_file,
    })
}

/// Load configuration from all sources except the command line
pub fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();

    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(file, config_file, |key| std::env::var(key).ok())
}
