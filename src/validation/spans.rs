//! Span reconciliation between an original and a redacted string
//!
//! A redaction service hands back a rewritten copy of the text. This module
//! works out which characters of the original disappeared in the rewrite and
//! reports each maximal run of them as a [`Finding`].
//!
//! # Design Decisions
//!
//! - **Character granularity**: the edit script is computed per Unicode
//!   scalar value, so offsets index directly into the original text.
//! - **Original offsets only**: inserted characters never advance the
//!   offset counter, they only exist in the rewrite.
//! - **No merging across kept characters**: two removed runs separated by a
//!   single kept character are two findings, since each reason quotes its
//!   exact substring.
//! - **Deterministic**: Myers diff with a fixed tie-break, and insertions
//!   inside a changed region are ordered after the removals.
//! - **Bounded**: with a deadline, the differ gives up on finding a
//!   minimal script once it passes and reports the rest of the changed
//!   region as one replacement. Findings stay ordered and quoted, only
//!   coarser.

use std::time::Instant;

use similar::{Algorithm, ChangeTag, TextDiff};

use super::types::{Finding, Range};

/// One step of a character-level edit script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOp {
    /// Present in both strings
    Kept(char),
    /// Present only in the original
    Removed(char),
    /// Present only in the modified string
    Inserted(char),
}

impl DiffOp {
    /// Whether this op drops a character of the original
    pub fn is_removed(&self) -> bool {
        matches!(self, DiffOp::Removed(_))
    }

    /// Whether this op consumes a character of the original
    pub fn in_original(&self) -> bool {
        !matches!(self, DiffOp::Inserted(_))
    }
}

/// Compute a character-level edit script from `original` to `modified`
///
/// Within each changed region (the ops between two kept characters) all
/// removals come first, then all insertions. This keeps a replaced
/// substring in one piece no matter how the differ interleaves the two.
pub fn edit_script(original: &str, modified: &str, deadline: Option<Instant>) -> Vec<DiffOp> {
    let mut config = TextDiff::configure();
    config.algorithm(Algorithm::Myers);
    if let Some(deadline) = deadline {
        config.deadline(deadline);
    }
    let diff = config.diff_chars(original, modified);

    let mut ops = Vec::with_capacity(original.len().max(modified.len()));
    let mut pending_inserts = Vec::new();

    for change in diff.iter_all_changes() {
        let value = change.value();
        match change.tag() {
            ChangeTag::Equal => {
                ops.append(&mut pending_inserts);
                ops.extend(value.chars().map(DiffOp::Kept));
            }
            ChangeTag::Delete => ops.extend(value.chars().map(DiffOp::Removed)),
            ChangeTag::Insert => pending_inserts.extend(value.chars().map(DiffOp::Inserted)),
        }
    }
    ops.append(&mut pending_inserts);

    ops
}

/// Collapse an edit script into the removed ranges of the original
///
/// Scans left to right with a running offset into the original. A range
/// opens at the first removed op and closes at the next op that is not a
/// removal; a range still open at the end closes at the final offset.
pub fn removed_ranges(ops: &[DiffOp]) -> Vec<Range> {
    let mut ranges = Vec::new();
    let mut open: Option<usize> = None;
    let mut offset = 0;

    for op in ops {
        if op.is_removed() {
            open.get_or_insert(offset);
        } else if let Some(start) = open.take() {
            ranges.push(Range::new(start, offset));
        }

        if op.in_original() {
            offset += 1;
        }
    }

    if let Some(start) = open {
        ranges.push(Range::new(start, offset));
    }

    ranges
}

/// Byte position of every character boundary in a string
///
/// Built once so slicing by character offsets does not rescan the text.
pub struct CharOffsets<'a> {
    text: &'a str,
    bytes: Vec<usize>,
}

impl<'a> CharOffsets<'a> {
    pub fn new(text: &'a str) -> Self {
        let bytes = text
            .char_indices()
            .map(|(byte, _)| byte)
            .chain([text.len()])
            .collect();
        Self { text, bytes }
    }

    /// Substring by character offsets
    ///
    /// Offsets past the end are clamped.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        let chars = self.bytes.len() - 1;
        let end = end.min(chars);
        let start = start.min(end);
        &self.text[self.bytes[start]..self.bytes[end]]
    }
}

/// Report every run of characters removed from `original` in `modified`
///
/// Findings come back ordered by start offset and never overlap. Identical
/// inputs always produce an empty list.
pub fn reconcile(original: &str, modified: &str) -> Vec<Finding> {
    reconcile_until(original, modified, None)
}

/// [`reconcile`] with a deadline for the differ
pub fn reconcile_until(original: &str, modified: &str, deadline: Option<Instant>) -> Vec<Finding> {
    let ops = edit_script(original, modified, deadline);
    let offsets = CharOffsets::new(original);

    removed_ranges(&ops)
        .into_iter()
        .map(|range| {
            let flagged = offsets.slice(range.start, range.end);
            Finding::new(range, format!("PII detected in {}", flagged))
        })
        .collect()
}
