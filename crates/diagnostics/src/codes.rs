//! Diagnostic code constants.
//!
//! Auto-generated from `spec/diagnostics.json` at build time.
//! Use these instead of string literals to get compile-time typo detection
//! and IDE autocomplete.

include!(concat!(env!("OUT_DIR"), "/generated_codes.rs"));

/// Every code in declaration order.
pub const ALL: &[&str] = include!(concat!(env!("OUT_DIR"), "/generated_all.rs"));
