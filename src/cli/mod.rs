//! Command-line interface for firewall.
//!
//! Provides commands for serving the moderation tools over MCP,
//! running them once against a file, and inspecting the configuration.

use std::io::{self, IsTerminal, Read};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{self, ResolvedConfig};
use crate::core::Services;
use crate::mcp::{sse, stdio};
use crate::tools::PiiEntities;
use crate::validation::ValidationResult;

/// firewall - PII and toxicity checks served over MCP
#[derive(Parser, Debug)]
#[command(name = "firewall")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the tools over SSE
    Serve {
        /// Address to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Serve the tools over stdin/stdout
    Stdio,

    /// Check text for PII
    Pii {
        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Entity preset (pii, spi) or comma-separated entity names
        #[arg(short, long)]
        entities: Option<PiiEntities>,
    },

    /// Check text for toxic content
    Toxic {
        /// Input file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Send the input as the whole prompt, skipping the template
        #[arg(long)]
        raw: bool,
    },

    /// List the tools the server exposes
    Tools,

    /// List models available on the language-model server
    Models,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = config::load_config()?;

        match self.command {
            Commands::Serve { host, port } => serve(config, host, port).await,
            Commands::Stdio => serve_stdio(&config).await,
            Commands::Pii { input, entities } => check_pii(&config, input, entities).await,
            Commands::Toxic { input, raw } => check_toxic(&config, input, raw).await,
            Commands::Tools => list_tools(&config),
            Commands::Models => list_models(&config).await,
            Commands::Config => show_config(&config),
        }
    }
}

/// Serve over SSE, with flags overriding the configured address
async fn serve(mut config: ResolvedConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    let services = Services::from_config(&config)?;
    services.check_backends().await;

    let server = Arc::new(services.tool_server(&config));
    sse::serve(server, addr).await
}

async fn serve_stdio(config: &ResolvedConfig) -> Result<()> {
    let services = Services::from_config(config)?;
    let server = services.tool_server(config);
    stdio::serve(&server).await
}

async fn check_pii(
    config: &ResolvedConfig,
    input: Option<PathBuf>,
    entities: Option<PiiEntities>,
) -> Result<()> {
    let text = read_input(input)?;
    config.safety.validate_input(&text)?;

    let services = Services::from_config(config)?;
    let result = services
        .detect_pii(config)
        .validate(&text, entities.as_ref())
        .await?;

    print_result(&result)
}

async fn check_toxic(config: &ResolvedConfig, input: Option<PathBuf>, raw: bool) -> Result<()> {
    let text = read_input(input)?;
    config.safety.validate_input(&text)?;

    let services = Services::from_config(config)?;
    let tool = services.detect_toxic(config);
    let result = if raw {
        tool.validate_prompt(&text).await?
    } else {
        tool.validate_query(&text).await?
    };

    print_result(&result)
}

fn list_tools(config: &ResolvedConfig) -> Result<()> {
    let services = Services::from_config(config)?;
    let tools = services.tool_server(config).list_tools();

    for tool in &tools {
        println!("{:<15} {}", tool.name, tool.description);
    }
    Ok(())
}

async fn list_models(config: &ResolvedConfig) -> Result<()> {
    let services = Services::from_config(config)?;
    let models = services
        .llm
        .list_models()
        .await
        .with_context(|| format!("Failed to list models at {}", services.llm.base_url()))?;

    if models.is_empty() {
        println!("No models found");
        return Ok(());
    }

    println!("{:<40} {:>12}", "NAME", "SIZE");
    println!("{}", "-".repeat(53));
    for model in models {
        println!("{:<40} {:>12}", model.name, model.size);
    }
    Ok(())
}

fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("Firewall Configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Server:");
    println!("  Listen:         {}:{}", cfg.host, cfg.port);
    println!();
    println!("PII:");
    println!("  Backend:        {}", cfg.pii.backend);
    println!("  Language:       {}", cfg.pii.language);
    println!("  Entities:       {}", cfg.pii.default_entities);
    println!("  Analyzer:       {}", cfg.pii.analyzer_url);
    println!("  Anonymizer:     {}", cfg.pii.anonymizer_url);
    println!(
        "  Hub:            {}",
        cfg.pii.hub_url.as_deref().unwrap_or("(not set)")
    );
    println!();
    println!("Toxicity:");
    println!("  LLM server:     {}", cfg.toxic.base_url);
    println!(
        "  API key:        {}",
        if cfg.toxic.api_key.is_some() { "(set)" } else { "(not set)" }
    );
    println!("  Model:          {}", cfg.toxic.model);
    println!(
        "  Template:       {}",
        cfg.toxic
            .template
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(built-in)".to_string())
    );
    println!("  Fail marker:    {}", cfg.toxic.fail_marker);
    println!("  Max tokens:     {}", cfg.toxic.max_tokens);
    println!("  Retry attempts: {}", cfg.toxic.retry.max_attempts);
    println!();
    println!("Safety limits:");
    println!("  Max input size: {} bytes", cfg.safety.max_input_bytes);
    println!("  Tool timeout:   {}s", cfg.safety.tool_timeout_seconds);

    Ok(())
}

/// Read input from a file, or from stdin when it is piped
fn read_input(input_file: Option<PathBuf>) -> Result<String> {
    if let Some(path) = input_file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()));
    }

    if io::stdin().is_terminal() {
        anyhow::bail!("No input provided. Use --input or pipe text on stdin");
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read from stdin")?;
    Ok(buffer)
}

fn print_result(result: &ValidationResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("Failed to encode result")?;
    println!("{}", json);
    Ok(())
}
