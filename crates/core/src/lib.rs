//! OPERATOR_CMD core library.
//!
//! Finds delimited command blocks in untrusted chat text and validates them
//! against the command schema before anything is allowed to touch a
//! filesystem. The main entry points are [`scan`] for whole transcripts,
//! [`validate`] for a single field map, and [`check_search_path`] for the
//! host-side directory check.

#![warn(missing_docs)]

/// Shorthand for building a `BTreeMap<String, String>` context from key-value pairs.
///
/// ```ignore
/// ctx!("line" => n.to_string(), "marker" => "OPERATOR_CMD")
/// ```
macro_rules! ctx {
    ($($k:expr => $v:expr),+ $(,)?) => {
        std::collections::BTreeMap::from([$(($k.into(), $v.into())),+])
    };
}

/// Typed commands, the action registry, and per-action payloads.
pub mod command;
/// OPERATOR_CMD grammar: lexer, field parser, block scanner.
pub mod grammar;
/// Host-side search path check behind an async directory probe.
pub mod probe;
/// Field validation, including base64 integrity.
pub mod validate;

// ── Convenience re-exports ──────────────────────────────────────────────────

// Scanner
pub use grammar::scanner::{ScanOutcome, ScanState, Step, accept_block, scan, scan_with_config};

// Fields
pub use grammar::fields::{FieldMap, FieldValue, parse_fields};

// Commands
pub use command::{Action, Command, CommentStyle, InsertPosition, Payload, WriteBody};

// Validator
pub use validate::{UnknownActionPolicy, decode_b64_field, validate, validate_with_policy};

// Probe
pub use probe::{DirectoryProbe, ProbeError, SearchPathError, TokioProbe, check_search_path};

// Diagnostics (re-exported from the diagnostics crate)
pub use grammar::diag::{Diagnostic, Span, codes, format_diagnostic, format_unknown_action};

// Config (re-exported from the config crate)
pub use operator_cmd_config::{Limits, ScanConfig};
