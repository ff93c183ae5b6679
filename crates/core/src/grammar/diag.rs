// Re-exports from the diagnostics crate, so core modules can write
// `grammar::diag::{Diagnostic, Span, codes}`.
pub use operator_cmd_diagnostics::*;
