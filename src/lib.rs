//! firewall - content moderation tools served over MCP
//!
//! Two tools check text before it reaches a user:
//! - `detect_pii` redacts personal data and reports where it was
//! - `detect_toxic` asks a guard model whether the text is acceptable
//!
//! # Architecture
//!
//! Detection is delegated to backends; this crate turns their answers
//! into structured findings:
//! - A redaction backend returns an anonymized copy of the text
//! - The copy is diffed against the input, and every removed region
//!   becomes a finding with character offsets into the original
//!
//! # Modules
//!
//! - `adapters`: Backend clients (Presidio, inference hub, regex, Ollama)
//! - `validation`: Findings, results, and the span reconciler
//! - `tools`: The moderation tools and their registry
//! - `mcp`: JSON-RPC dispatch and the SSE/stdio transports
//! - `core`: Retry and safety policy, service wiring
//! - `config`: Config file and environment resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Serve both tools over SSE on port 8080
//! firewall serve
//!
//! # Check a file directly
//! firewall pii --input reply.txt --entities spi
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod mcp;
pub mod tools;
pub mod validation;

// Re-export main types for convenience
pub use crate::core::{SafetyLimits, Services};
pub use mcp::ToolServer;
pub use tools::{DetectPii, DetectToxic, PiiEntities, Tool, ToolRegistry};
pub use validation::{reconcile, Finding, Range, ValidationResult};
