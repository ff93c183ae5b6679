//! Shared test helpers for `operator_cmd_core` integration tests.

#![allow(unreachable_pub)]

use operator_cmd_core::{Diagnostic, ScanOutcome};

// ─── Block builders ──────────────────────────────────────────────────────────

/// Wrap body lines in a start/end marker pair.
#[allow(dead_code)]
pub fn block(body: &[&str]) -> String {
    let mut out = String::from("OPERATOR_CMD\n");
    for line in body {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("END_OPERATOR_CMD\n");
    out
}

/// A minimal valid `fs.list` block with the given id.
#[allow(dead_code)]
pub fn list_block(id: &str) -> String {
    block(&[
        "version: 1",
        &format!("id: {id}"),
        "action: fs.list",
        "path: .",
    ])
}

/// A valid block whose body is exactly `n` lines long.
///
/// The header takes four lines; the rest are filler fields.
#[allow(dead_code)]
pub fn block_with_lines(n: usize) -> String {
    assert!(n >= 4, "a valid block needs at least 4 lines");
    let mut body: Vec<String> = vec![
        "version: 1".into(),
        "id: big".into(),
        "action: fs.read".into(),
        "path: big.txt".into(),
    ];
    body.extend((body.len()..n).map(|i| format!("note_{i}: filler")));
    let refs: Vec<&str> = body.iter().map(String::as_str).collect();
    block(&refs)
}

// ─── Outcome helpers ─────────────────────────────────────────────────────────

/// Diagnostic codes, in order.
#[allow(dead_code)]
pub fn diag_codes(outcome: &ScanOutcome) -> Vec<String> {
    outcome
        .diagnostics
        .iter()
        .map(|d| d.code.to_string())
        .collect()
}

/// Command ids, in order.
#[allow(dead_code)]
pub fn command_ids(outcome: &ScanOutcome) -> Vec<String> {
    outcome.commands.iter().map(|c| c.id.clone()).collect()
}

/// Assert the outcome has exactly one diagnostic with `code` and return it.
#[allow(dead_code)]
pub fn single_diag<'a>(outcome: &'a ScanOutcome, code: &str) -> &'a Diagnostic {
    assert_eq!(
        outcome.diagnostics.len(),
        1,
        "expected exactly one diagnostic, got {:?}",
        outcome.diagnostics
    );
    let d = &outcome.diagnostics[0];
    assert_eq!(d.code, code, "unexpected diagnostic: {d}");
    d
}
