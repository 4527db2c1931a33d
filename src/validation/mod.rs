//! Validation results and span reconciliation
//!
//! Every tool returns a [`ValidationResult`]. Failures carry the flagged
//! ranges of the original text, computed by diffing it against the
//! rewrite the redaction service produced.
//!
//! # Example
//!
//! ```
//! use firewall::validation::reconcile;
//!
//! let findings = reconcile("hello world", "hello");
//! assert_eq!(findings.len(), 1);
//! assert_eq!(findings[0].reason, "PII detected in  world");
//! ```

pub mod spans;
pub mod types;

pub use spans::{edit_script, reconcile, reconcile_until, removed_ranges, CharOffsets, DiffOp};
pub use types::{Finding, Range, ValidationResult};
