//! Block scanner.
//!
//! Walks the input one physical line at a time through an explicit
//! [`ScanState`]. Each [`ScanState::step`] consumes the state and returns the
//! next one plus at most one [`Event`]: either a scan-level diagnostic or a
//! closed [`Block`] ready for acceptance. Acceptance (charset, line grammar,
//! field validation) happens in [`scan_with_config`], outside the state
//! machine.
//!
//! Every diagnostic ends the current block attempt, so the scanner never
//! loses synchronization: the next lone `OPERATOR_CMD` always starts fresh.

use serde::Serialize;
use std::collections::BTreeMap;

use super::diag::{Diagnostic, Span, codes};
use super::fields::parse_fields;
use super::lexer::{
    END_MARKER, Line, LineKind, Marker, START_MARKER, excerpt, first_non_ascii, lines,
    split_key_value,
};
use crate::command::Command;
use crate::validate::UnknownActionPolicy;
use operator_cmd_config::{Limits, ScanConfig};

/// Result of scanning one input buffer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    /// Accepted commands, in input order.
    pub commands: Vec<Command>,
    /// Diagnostics for every rejected block attempt, in input order.
    pub diagnostics: Vec<Diagnostic>,
}

impl ScanOutcome {
    /// `true` when no block was rejected.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// A delimited block whose markers and size were acceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    /// The `OPERATOR_CMD` line.
    pub opener: Line<'a>,
    /// Lines between the markers.
    pub body: Vec<Line<'a>>,
    /// The `END_OPERATOR_CMD` line.
    pub closer: Line<'a>,
}

impl Block<'_> {
    /// Byte span from the start marker through the end marker.
    pub fn span(&self) -> Span {
        self.opener.span().cover(self.closer.span())
    }
}

/// What one step of the scanner produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<'a> {
    /// A block attempt failed at the scan level.
    Diagnostic(Diagnostic),
    /// A block closed and is ready for acceptance checks.
    Block(Block<'a>),
}

/// The next state and its event, if any.
#[derive(Debug, Clone)]
pub struct Step<'a> {
    /// State to feed the next line into.
    pub state: ScanState<'a>,
    /// Event produced by this line.
    pub event: Option<Event<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenBlock<'a> {
    opener: Line<'a>,
    body: Vec<Line<'a>>,
    chars: usize,
}

impl<'a> OpenBlock<'a> {
    fn new(opener: Line<'a>) -> Self {
        Self {
            opener,
            body: Vec::new(),
            chars: 0,
        }
    }

    /// Span from the opener through `last`.
    fn span_through(&self, last: &Line<'_>) -> Span {
        self.opener.span().cover(last.span())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Phase<'a> {
    #[default]
    Outside,
    Inside(OpenBlock<'a>),
}

/// Scanner state between lines: outside any block, or inside one with its
/// buffered body and running character count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanState<'a> {
    phase: Phase<'a>,
}

impl<'a> ScanState<'a> {
    /// Initial state: outside any block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a block is currently open.
    pub fn is_inside(&self) -> bool {
        matches!(self.phase, Phase::Inside(_))
    }

    /// Number of body lines buffered in the open block.
    pub fn buffered_lines(&self) -> usize {
        match &self.phase {
            Phase::Inside(open) => open.body.len(),
            Phase::Outside => 0,
        }
    }

    /// Advance over one line.
    pub fn step(self, line: Line<'a>, limits: &Limits) -> Step<'a> {
        let kind = line.kind();
        tracing::trace!(line = line.number, ?kind, inside = self.is_inside(), "classify");

        if let LineKind::MarkerNotAlone(marker) = kind {
            return abort(marker_not_alone(&line, marker));
        }

        match (self.phase, kind) {
            (Phase::Outside, LineKind::Marker(Marker::Start)) => {
                tracing::debug!(line = line.number, "block opened");
                inside(OpenBlock::new(line))
            }
            (Phase::Outside, _) => Step {
                state: ScanState::new(),
                event: None,
            },
            (Phase::Inside(open), LineKind::Marker(Marker::End)) => {
                tracing::debug!(
                    opened = open.opener.number,
                    closed = line.number,
                    lines = open.body.len(),
                    "block closed"
                );
                Step {
                    state: ScanState::new(),
                    event: Some(Event::Block(Block {
                        opener: open.opener,
                        body: open.body,
                        closer: line,
                    })),
                }
            }
            (Phase::Inside(open), LineKind::Marker(Marker::Start)) => {
                let diag = Diagnostic::new(
                    codes::NESTED_BLOCK,
                    format!(
                        "line {}: {START_MARKER} inside a block opened at line {}",
                        line.number, open.opener.number
                    ),
                )
                .with_span(line.span())
                .with_context(ctx!(
                    "line" => line.number.to_string(),
                    "block_line" => open.opener.number.to_string(),
                ));
                tracing::debug!(line = line.number, "nested start marker; restarting block");
                Step {
                    state: ScanState {
                        phase: Phase::Inside(OpenBlock::new(line)),
                    },
                    event: Some(Event::Diagnostic(diag)),
                }
            }
            (Phase::Inside(open), LineKind::Blank) => abort(
                Diagnostic::new(
                    codes::EMPTY_LINE_IN_CMD,
                    format!(
                        "line {}: blank line inside a block opened at line {}",
                        line.number, open.opener.number
                    ),
                )
                .with_span(line.span())
                .with_context(ctx!(
                    "line" => line.number.to_string(),
                    "block_line" => open.opener.number.to_string(),
                )),
            ),
            (Phase::Inside(mut open), _) => {
                open.chars += line.text.chars().count() + 1;
                open.body.push(line);
                let reason = if open.body.len() > limits.max_block_lines {
                    Some(format!("too many lines (more than {})", limits.max_block_lines))
                } else if open.chars > limits.max_block_chars {
                    Some(format!(
                        "too many characters (more than {})",
                        limits.max_block_chars
                    ))
                } else {
                    None
                };
                match reason {
                    Some(reason) => abort(
                        Diagnostic::new(
                            codes::BLOCK_TOO_LARGE,
                            format!("block opened at line {}: {reason}", open.opener.number),
                        )
                        .with_span(open.span_through(&line))
                        .with_context(ctx!(
                            "line" => line.number.to_string(),
                            "block_line" => open.opener.number.to_string(),
                        )),
                    ),
                    None => inside(open),
                }
            }
        }
    }

    /// End of input. An open block becomes `ERR_MISSING_END_MARKER`.
    pub fn finish(self) -> Option<Diagnostic> {
        let Phase::Inside(open) = self.phase else {
            return None;
        };
        let last = open.body.last().copied().unwrap_or(open.opener);
        Some(
            Diagnostic::new(
                codes::MISSING_END_MARKER,
                format!(
                    "block opened at line {} has no {END_MARKER}",
                    open.opener.number
                ),
            )
            .with_span(open.span_through(&last))
            .with_context(ctx!("block_line" => open.opener.number.to_string())),
        )
    }
}

fn inside(open: OpenBlock<'_>) -> Step<'_> {
    Step {
        state: ScanState {
            phase: Phase::Inside(open),
        },
        event: None,
    }
}

fn abort<'a>(diag: Diagnostic) -> Step<'a> {
    tracing::debug!(code = %diag.code, "block attempt aborted");
    Step {
        state: ScanState::new(),
        event: Some(Event::Diagnostic(diag)),
    }
}

fn marker_not_alone(line: &Line<'_>, marker: Marker) -> Diagnostic {
    Diagnostic::new(
        codes::MARKER_NOT_ALONE,
        format!(
            "line {}: {} must be alone on its line (got \"{}\")",
            line.number,
            marker.token(),
            excerpt(line.text)
        ),
    )
    .with_span(line.span())
    .with_context(ctx!(
        "line" => line.number.to_string(),
        "marker" => marker.token(),
    ))
}

/// Run the acceptance checks on a closed block.
///
/// Order: non-ASCII characters, `key: value` grammar, then field
/// validation under the config's unknown-action policy.
pub fn accept_block(block: &Block<'_>, config: &ScanConfig) -> Result<Command, Diagnostic> {
    let block_ctx = || -> BTreeMap<String, String> {
        ctx!("block_line" => block.opener.number.to_string())
    };

    for line in &block.body {
        if let Some((column, ch)) = first_non_ascii(line.text) {
            return Err(Diagnostic::new(
                codes::NON_ASCII_IN_CMD,
                format!(
                    "line {}: non-ASCII character {ch:?} at column {column}",
                    line.number
                ),
            )
            .with_span(line.span())
            .with_context(block_ctx())
            .with_context(ctx!("line" => line.number.to_string())));
        }
    }

    let mut pairs = Vec::with_capacity(block.body.len());
    for line in &block.body {
        match split_key_value(line.text) {
            Some(pair) => pairs.push(pair),
            None => {
                return Err(Diagnostic::new(
                    codes::NON_KEY_VALUE_LINE,
                    format!(
                        "line {}: expected \"key: value\", got \"{}\"",
                        line.number,
                        excerpt(line.text)
                    ),
                )
                .with_span(line.span())
                .with_context(block_ctx())
                .with_context(ctx!("line" => line.number.to_string())));
            }
        }
    }

    let fields = parse_fields(pairs);
    Command::from_fields_with_policy(fields, UnknownActionPolicy::from(config))
        .map_err(|d| d.with_span(block.span()).with_context(block_ctx()))
}

/// Scan `text` with the default configuration.
pub fn scan(text: &str) -> ScanOutcome {
    scan_with_config(text, &ScanConfig::default())
}

/// Scan `text`, returning accepted commands and diagnostics in input order.
pub fn scan_with_config(text: &str, config: &ScanConfig) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let mut state = ScanState::new();

    for line in lines(text) {
        let Step { state: next, event } = state.step(line, &config.limits);
        state = next;
        match event {
            None => {}
            Some(Event::Diagnostic(diag)) => outcome.diagnostics.push(diag),
            Some(Event::Block(block)) => match accept_block(&block, config) {
                Ok(command) => {
                    tracing::debug!(id = %command.id, action = %command.action, "command accepted");
                    outcome.commands.push(command);
                }
                Err(diag) => {
                    tracing::debug!(code = %diag.code, line = block.opener.number, "block rejected");
                    outcome.diagnostics.push(diag);
                }
            },
        }
    }
    outcome.diagnostics.extend(state.finish());

    tracing::debug!(
        commands = outcome.commands.len(),
        diagnostics = outcome.diagnostics.len(),
        "scan complete"
    );
    outcome
}
