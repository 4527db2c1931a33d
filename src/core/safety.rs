//! Safety limits for tool calls.
//!
//! The span reconciler's cost grows with the product of both input
//! lengths. It runs on the blocking pool under a diff deadline, and the
//! server bounds every call at the call site:
//! - Maximum query size
//! - Per-call timeout

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Safety limits for tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Maximum query size in bytes (default: 1MB)
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: u64,

    /// Per-call timeout in seconds (default: 120)
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_seconds: u64,
}

fn default_max_input_bytes() -> u64 {
    1024 * 1024
} // 1MB
fn default_tool_timeout() -> u64 {
    120
} // 2 min

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: default_max_input_bytes(),
            tool_timeout_seconds: default_tool_timeout(),
        }
    }
}

impl SafetyLimits {
    /// Validate a query against the size limit
    pub fn validate_input(&self, input: &str) -> Result<(), SafetyViolation> {
        let size = input.len() as u64;
        if size > self.max_input_bytes {
            return Err(SafetyViolation::MaxInputBytes {
                actual: size,
                limit: self.max_input_bytes,
            });
        }
        Ok(())
    }

    /// Timeout applied to a single tool call
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_seconds)
    }

    /// Violation to report once a call has exceeded its timeout
    pub fn timeout_violation(&self, tool: &str) -> SafetyViolation {
        SafetyViolation::ToolTimeout {
            tool: tool.to_string(),
            limit_seconds: self.tool_timeout_seconds,
        }
    }
}

/// Safety violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyViolation {
    #[error("Maximum input bytes exceeded: {actual} > {limit}")]
    MaxInputBytes { actual: u64, limit: u64 },

    #[error("Tool '{tool}' timed out after {limit_seconds}s")]
    ToolTimeout { tool: String, limit_seconds: u64 },
}
