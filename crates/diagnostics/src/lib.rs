//! Diagnostics for OPERATOR_CMD scanning and validation.
//!
//! Provides [`Diagnostic`] and [`Span`], plus the canonical one-line
//! rendering `Invalid OPERATOR_CMD (<code>): <detail>`. Diagnostic codes are
//! defined in the [`codes`] module and are part of the stable public
//! contract: downstream tooling matches on the exact strings.

#![warn(missing_docs)]

/// Diagnostic code constants auto-generated from `spec/diagnostics.json`.
pub mod codes;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Leading text of every rendered diagnostic.
pub const MESSAGE_PREFIX: &str = "Invalid OPERATOR_CMD";

/// Byte span in the scanned text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    /// Byte offset of the first character (0-based).
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Span {
    /// Create a span covering `[start, end)`.
    ///
    /// Panics if `end < start`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(end >= start, "Span end ({end}) < start ({start})");
        Self { start, end }
    }

    /// Create a zero-width span at the given position.
    pub fn empty(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn cover(self, other: Span) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A structured, non-fatal rejection of one block or field set.
///
/// Diagnostics are values: the scanner and validator return them, never
/// panic with them. Only `code` and `detail` take part in the canonical
/// rendering; `span` and `context` exist for tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable code (e.g., `"ERR_NESTED_BLOCK"`).
    pub code: Cow<'static, str>,
    /// Human-readable detail.
    pub detail: String,
    /// Byte span in the scanned text, when the diagnostic came from a scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    /// Machine-readable context for tooling. Keys and values are free-form strings.
    ///
    /// Uses `BTreeMap` for deterministic key ordering in serialized output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl Diagnostic {
    /// Create a diagnostic with no span or context.
    pub fn new(code: impl Into<Cow<'static, str>>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: detail.into(),
            span: None,
            context: None,
        }
    }

    /// `ERR_UNKNOWN_ACTION` for an action the schema does not recognize.
    pub fn unknown_action(action: &str) -> Self {
        Self::new(codes::UNKNOWN_ACTION, unknown_action_detail(action))
            .with_context(BTreeMap::from([("action".into(), action.into())]))
    }

    /// Attach a source span (builder pattern).
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach machine-readable context metadata (builder pattern).
    ///
    /// Keys are short descriptors like `"line"`, `"field"`, `"marker"`.
    /// Context added here is merged with any context already present.
    pub fn with_context(mut self, ctx: BTreeMap<String, String>) -> Self {
        match self.context.as_mut() {
            Some(existing) => existing.extend(ctx),
            None => self.context = Some(ctx),
        }
        self
    }

    /// Canonical one-line rendering, identical to `to_string()`.
    pub fn message(&self) -> String {
        format_diagnostic(&self.code, &self.detail)
    }

    /// Returns the human-readable explanation for this diagnostic's code, if available.
    pub fn explain(&self) -> Option<&'static str> {
        explain(&self.code)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{MESSAGE_PREFIX} ({}): {}", self.code, self.detail)
    }
}

/// Render a `(code, detail)` pair as `Invalid OPERATOR_CMD (<code>): <detail>`.
pub fn format_diagnostic(code: &str, detail: &str) -> String {
    format!("{MESSAGE_PREFIX} ({code}): {detail}")
}

/// Render the `ERR_UNKNOWN_ACTION` message for `action`.
pub fn format_unknown_action(action: &str) -> String {
    format_diagnostic(codes::UNKNOWN_ACTION, &unknown_action_detail(action))
}

fn unknown_action_detail(action: &str) -> String {
    format!("unknown action \"{action}\"")
}

/// Returns the human-readable explanation for a diagnostic code, if known.
///
/// Auto-generated from `spec/diagnostics.json` at build time.
pub fn explain(id: &str) -> Option<&'static str> {
    include!(concat!(env!("OUT_DIR"), "/generated_explain.rs"))
}
