//! Pretty diagnostic rendering using ariadne.
//!
//! Turns scanner [`Diagnostic`]s into ariadne [`Report`]s with the offending
//! transcript lines underlined. Falls back to structured JSON when output is
//! piped or when the user asks for it.

use std::io::{self, IsTerminal};

use ariadne::{Color, Config, Fmt, IndexType, Label, Report, ReportKind, Source};
use operator_cmd_diagnostics::Diagnostic;

// ── Output format ───────────────────────────────────────────────────────

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    /// Coloured, source-annotated output (ariadne).
    Pretty,
    /// Machine-readable JSON.
    Json,
}

impl Format {
    /// Use the explicit choice, or pick by whether stdout is a TTY.
    pub(crate) fn resolve_or_detect(explicit: Option<&str>) -> Self {
        match explicit {
            Some("json") => Format::Json,
            Some("pretty") => Format::Pretty,
            _ => {
                if io::stdout().is_terminal() {
                    Format::Pretty
                } else {
                    Format::Json
                }
            }
        }
    }
}

// ── Pretty rendering ────────────────────────────────────────────────────

/// Render diagnostics to stderr.
///
/// Diagnostics with a span get source context; the rest print as a single
/// canonical line.
pub(crate) fn render_diagnostics_pretty(source: &str, filename: &str, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }

    // Spans are byte offsets into the transcript.
    let config = Config::default()
        .with_compact(false)
        .with_index_type(IndexType::Byte);
    let mut cache = (filename, Source::from(source));

    for diag in diagnostics {
        let Some(span) = &diag.span else {
            eprintln!("error: {diag}");
            if let Some(note) = context_note(diag) {
                eprintln!("  = note: {note}");
            }
            continue;
        };

        let start = span.start.min(source.len());
        let end = span.end.min(source.len()).max(start);

        let mut builder = Report::build(ReportKind::Error, (filename, start..end))
            .with_code(diag.code.as_ref())
            .with_message(&diag.detail)
            .with_config(config)
            .with_label(
                Label::new((filename, start..end))
                    .with_message(label_message(diag))
                    .with_color(Color::Red),
            );
        if let Some(explanation) = diag.explain() {
            builder = builder.with_help(explanation);
        }
        builder.finish().eprint(&mut cache).ok();
    }
}

fn context_note(diag: &Diagnostic) -> Option<String> {
    let ctx = diag.context.as_ref().filter(|c| !c.is_empty())?;
    Some(
        ctx.iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Compact label from context (e.g. `block_line=3, line=5`), or the canonical
/// message when there is no context.
fn label_message(diag: &Diagnostic) -> String {
    context_note(diag).unwrap_or_else(|| diag.message())
}

// ── Summary line ────────────────────────────────────────────────────────

/// Print a coloured count line, e.g. `2 commands accepted, 1 block rejected`.
pub(crate) fn print_summary(accepted: usize, rejected: usize) {
    let plural = |n: usize| if n == 1 { "" } else { "s" };
    let accepted_part = format!("{accepted} command{} accepted", plural(accepted));
    let rejected_part = format!("{rejected} block{} rejected", plural(rejected));
    if rejected == 0 {
        eprintln!("{}", accepted_part.fg(Color::Green));
    } else {
        eprintln!("{}, {}", accepted_part, rejected_part.fg(Color::Red));
    }
}
