//! Core runtime pieces.
//!
//! This module contains:
//! - Retry: backoff policy for backend calls
//! - Safety: input size and timeout limits for tool calls
//! - Services: wiring from configuration to a running tool server

pub mod retry;
pub mod safety;
pub mod services;

// Re-export commonly used types
pub use retry::RetryPolicy;
pub use safety::{SafetyLimits, SafetyViolation};
pub use services::Services;
