//! Per-action field validation.
//!
//! [`validate`] runs the header checks (required fields, id charset, path
//! policy) and then every entry of [`RULES`] in order. The first violation
//! is returned; later rules never see a field map an earlier rule rejected.
//!
//! Actions outside the registry are `ERR_UNKNOWN_ACTION` unless the caller
//! opts in with [`UnknownActionPolicy::Allow`].

/// Base64 syntax and canonical round-trip checks.
pub mod b64;

use crate::command::{
    Action, CommentStyle, InsertPosition, SLICE_LEN_KEYS, SLICE_START_KEYS, is_fs_action,
    is_operator_action, numeric_param,
};
use crate::grammar::diag::{Diagnostic, codes};
use crate::grammar::fields::{FieldMap, FieldValue};
use crate::grammar::lexer::first_non_ascii;
use operator_cmd_config::ScanConfig;

pub use b64::{B64_FIELDS, B64Error, decode_b64_field, decode_canonical, is_b64_syntax};

/// Header fields every command must carry, in reporting order.
pub const REQUIRED_FIELDS: &[&str] = &["version", "id", "action"];

/// Treatment of an `action` that is not in the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownActionPolicy {
    /// Report `ERR_UNKNOWN_ACTION`.
    #[default]
    Reject,
    /// Accept it as an unrecognized payload. Action-specific rules are skipped.
    Allow,
}

impl From<&ScanConfig> for UnknownActionPolicy {
    fn from(config: &ScanConfig) -> Self {
        if config.allow_unknown_actions {
            UnknownActionPolicy::Allow
        } else {
            UnknownActionPolicy::Reject
        }
    }
}

/// Field map plus the already-checked action name, shared by all rules.
struct RuleCtx<'a> {
    fields: &'a FieldMap,
    action: &'a str,
    known: Option<Action>,
    policy: UnknownActionPolicy,
}

type Rule = fn(&RuleCtx<'_>) -> Result<(), Diagnostic>;

/// Ordered rule table. The first failing rule wins.
const RULES: &[(&str, Rule)] = &[
    ("version", rule_version),
    ("action", rule_known_action),
    ("write_content", rule_write_content),
    ("search_query", rule_search_query),
    ("comment_style", rule_comment_style),
    ("region", rule_region),
    ("read_slice", rule_read_slice),
    ("edit_payloads", rule_edit_payloads),
    ("content_newlines", rule_content_newlines),
    ("base64", rule_base64),
];

/// Validate one parsed field map, rejecting unknown actions.
///
/// Callable on its own (e.g. for a field map that did not come from a
/// scan); the scanner calls it for every accepted block.
pub fn validate(fields: &FieldMap) -> Result<(), Diagnostic> {
    validate_with_policy(fields, UnknownActionPolicy::Reject)
}

/// [`validate`] with an explicit unknown-action policy.
pub fn validate_with_policy(
    fields: &FieldMap,
    policy: UnknownActionPolicy,
) -> Result<(), Diagnostic> {
    let action = check_header(fields)?;
    let ctx = RuleCtx {
        fields,
        known: Action::lookup(&action),
        action: &action,
        policy,
    };
    for (name, rule) in RULES {
        if let Err(diag) = rule(&ctx) {
            tracing::trace!(rule = *name, code = %diag.code, "field rule failed");
            return Err(diag);
        }
    }
    Ok(())
}

// ── Header ──────────────────────────────────────────────────────────────

/// Required fields, id charset and path policy. Returns the trimmed action.
fn check_header(fields: &FieldMap) -> Result<String, Diagnostic> {
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|key| match *key {
            "version" => !fields.contains_key(key),
            _ => fields.non_blank(key).is_none(),
        })
        .collect();
    if !missing.is_empty() {
        let list = missing.join(", ");
        return Err(Diagnostic::new(
            codes::MISSING_REQUIRED_FIELDS,
            format!("missing required fields: {list}"),
        )
        .with_context(ctx!("fields" => list)));
    }

    let id = fields.non_blank("id").unwrap_or_default();
    if let Some((column, ch)) = first_non_ascii(&id) {
        return Err(Diagnostic::new(
            codes::NON_ASCII_IN_CMD,
            format!("id contains non-ASCII character {ch:?} at column {column}"),
        )
        .with_context(ctx!("field" => "id")));
    }

    let action = fields.non_blank("action").unwrap_or_default();
    let has_path = fields.non_blank("path").is_some();
    if is_fs_action(&action) && !has_path {
        return Err(Diagnostic::new(
            codes::ACTION_REQUIRES_PATH,
            format!("action \"{action}\" requires path"),
        )
        .with_context(ctx!("action" => action.as_str())));
    }
    if !is_fs_action(&action) && has_path {
        let detail = if is_operator_action(&action) {
            format!("operator action \"{action}\" must not include path")
        } else {
            format!("action \"{action}\" does not accept path")
        };
        return Err(Diagnostic::new(codes::ACTION_FORBIDS_PATH, detail)
            .with_context(ctx!("action" => action.as_str())));
    }
    Ok(action)
}

// ── Rules ───────────────────────────────────────────────────────────────

fn rule_version(ctx: &RuleCtx<'_>) -> Result<(), Diagnostic> {
    match ctx.fields.get("version") {
        Some(FieldValue::Number(n)) if *n == 1.0 => Ok(()),
        other => {
            let got = other.map(|v| v.to_text().into_owned()).unwrap_or_default();
            Err(Diagnostic::new(
                codes::UNSUPPORTED_VERSION,
                format!("unsupported version \"{got}\" (expected 1)"),
            ))
        }
    }
}

fn rule_known_action(ctx: &RuleCtx<'_>) -> Result<(), Diagnostic> {
    if ctx.known.is_some() || ctx.policy == UnknownActionPolicy::Allow {
        return Ok(());
    }
    Err(Diagnostic::unknown_action(ctx.action))
}

fn rule_write_content(ctx: &RuleCtx<'_>) -> Result<(), Diagnostic> {
    if ctx.known != Some(Action::FsWrite) {
        return Ok(());
    }
    let f = ctx.fields;
    if f.get_str("content").is_some() || f.get_str("content_b64").is_some() {
        return Ok(());
    }
    Err(Diagnostic::new(
        codes::MISSING_WRITE_CONTENT,
        "fs.write requires content or content_b64",
    ))
}

fn rule_search_query(ctx: &RuleCtx<'_>) -> Result<(), Diagnostic> {
    if !matches!(ctx.known, Some(Action::FsSearch | Action::FsSearchTree)) {
        return Ok(());
    }
    if ctx.fields.non_blank("query").is_some() || ctx.fields.non_blank("q").is_some() {
        return Ok(());
    }
    Err(Diagnostic::new(
        codes::MISSING_QUERY,
        format!("{} requires query", ctx.action),
    ))
}

fn rule_comment_style(ctx: &RuleCtx<'_>) -> Result<(), Diagnostic> {
    CommentStyle::from_fields(ctx.fields)
        .map(|_| ())
        .map_err(|detail| Diagnostic::new(codes::INVALID_COMMENT_STYLE, detail))
}

fn rule_region(ctx: &RuleCtx<'_>) -> Result<(), Diagnostic> {
    let Some(action) = ctx.known.filter(|a| a.is_region()) else {
        return Ok(());
    };
    let f = ctx.fields;
    if f.non_blank("marker_id").is_none() {
        return Err(Diagnostic::new(
            codes::MISSING_MARKER_ID,
            format!("{action} requires marker_id"),
        ));
    }
    if matches!(action, Action::FsReplaceRegion | Action::FsInsertRegion)
        && !has_b64_text(f, "content_b64")
    {
        return Err(Diagnostic::new(
            codes::MISSING_CONTENT_B64,
            format!("{action} requires content_b64"),
        ));
    }
    if action != Action::FsInsertRegion {
        return Ok(());
    }
    if f.non_blank("anchor").is_none() {
        return Err(Diagnostic::new(
            codes::MISSING_ANCHOR,
            "fs.insertRegion requires anchor",
        ));
    }
    if let Err(detail) = numeric_param(f, &["occurrence"]) {
        return Err(Diagnostic::new(codes::INVALID_ANCHOR_OCCURRENCE, detail));
    }
    if let Some(position) = f.get("position")
        && InsertPosition::parse(position).is_none()
    {
        return Err(Diagnostic::new(
            codes::INVALID_INSERT_POSITION,
            format!("position must be \"before\" or \"after\" (got \"{position}\")"),
        ));
    }
    Ok(())
}

fn rule_read_slice(ctx: &RuleCtx<'_>) -> Result<(), Diagnostic> {
    if ctx.known != Some(Action::FsReadSlice) {
        return Ok(());
    }
    for aliases in [SLICE_START_KEYS, SLICE_LEN_KEYS] {
        numeric_param(ctx.fields, aliases)
            .map_err(|detail| Diagnostic::new(codes::INVALID_READSLICE_PARAMS, detail))?;
    }
    Ok(())
}

fn rule_edit_payloads(ctx: &RuleCtx<'_>) -> Result<(), Diagnostic> {
    let (field, code) = match ctx.known {
        Some(Action::FsApplyEdits) => ("edits_b64", codes::MISSING_EDITS_B64),
        Some(Action::FsPatch) => ("patch_b64", codes::MISSING_PATCH_B64),
        _ => return Ok(()),
    };
    if has_b64_text(ctx.fields, field) {
        return Ok(());
    }
    Err(Diagnostic::new(
        code,
        format!("{} requires {field}", ctx.action),
    ))
}

fn rule_content_newlines(ctx: &RuleCtx<'_>) -> Result<(), Diagnostic> {
    match ctx.fields.get_str("content") {
        Some(content) if content.contains(['\n', '\r']) => Err(Diagnostic::new(
            codes::CONTENT_HAS_NEWLINES,
            "content must be a single line; use content_b64 for multi-line content",
        )
        .with_context(ctx!("field" => "content"))),
        _ => Ok(()),
    }
}

/// A `_b64` payload is present only as non-blank text; `true` is not base64.
fn has_b64_text(fields: &FieldMap, key: &str) -> bool {
    fields.get_str(key).is_some_and(|v| !v.trim().is_empty())
}

fn rule_base64(ctx: &RuleCtx<'_>) -> Result<(), Diagnostic> {
    B64_FIELDS
        .iter()
        .filter_map(|key| ctx.fields.get(key).map(|v| (*key, v)))
        .try_for_each(|(key, value)| match value {
            FieldValue::Text(text) => b64::check_b64_field(key, text),
            other => Err(b64::non_text_b64_field(key, other)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::fields::parse_fields;

    fn base(action: &'static str, extra: &[(&'static str, &'static str)]) -> FieldMap {
        let mut pairs = vec![("version", "1"), ("id", "t1"), ("action", action)];
        if is_fs_action(action) {
            pairs.push(("path", "a.txt"));
        }
        pairs.extend_from_slice(extra);
        parse_fields(pairs)
    }

    fn code_of(fields: &FieldMap) -> String {
        validate(fields).unwrap_err().code.into_owned()
    }

    #[test]
    fn every_rule_is_named_once() {
        let mut names: Vec<_> = RULES.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), RULES.len());
    }

    #[test]
    fn minimal_commands_pass() {
        assert!(validate(&base("fs.list", &[])).is_ok());
        assert!(validate(&base("operator.getInterfaceSpec", &[])).is_ok());
    }

    #[test]
    fn unknown_action_rejected_by_default() {
        let d = validate(&base("fs.teleport", &[])).unwrap_err();
        assert_eq!(d.code, codes::UNKNOWN_ACTION);
        assert_eq!(d.context.as_ref().unwrap()["action"], "fs.teleport");
        assert_eq!(code_of(&base("custom.thing", &[])), codes::UNKNOWN_ACTION);
    }

    #[test]
    fn unknown_action_allowed_on_request() {
        let f = base("custom.thing", &[]);
        assert!(validate_with_policy(&f, UnknownActionPolicy::Allow).is_ok());
        // Generic rules still run for an allowed unknown action.
        let mut f = base("fs.teleport", &[("content_b64", "!!")]);
        let d = validate_with_policy(&f, UnknownActionPolicy::Allow).unwrap_err();
        assert_eq!(d.code, codes::INVALID_BASE64);
        f.insert("version", FieldValue::Number(2.0));
        assert_eq!(code_of(&f), codes::UNSUPPORTED_VERSION);
    }

    #[test]
    fn policy_follows_scan_config() {
        assert_eq!(
            UnknownActionPolicy::from(&ScanConfig::default()),
            UnknownActionPolicy::Reject
        );
        let config = ScanConfig {
            allow_unknown_actions: true,
            ..Default::default()
        };
        assert_eq!(UnknownActionPolicy::from(&config), UnknownActionPolicy::Allow);
    }

    #[test]
    fn b64_fields_must_be_text() {
        let mut f = base("fs.replaceRegion", &[("marker_id", "m")]);
        f.insert("content_b64", FieldValue::Bool(true));
        assert_eq!(code_of(&f), codes::MISSING_CONTENT_B64);

        let mut f = base("fs.patch", &[]);
        f.insert("patch_b64", FieldValue::Bool(false));
        assert_eq!(code_of(&f), codes::MISSING_PATCH_B64);

        // A number where base64 is expected fails the integrity rule.
        let mut f = base("fs.write", &[("content", "x")]);
        f.insert("content_b64", FieldValue::Number(1234.0));
        let d = validate(&f).unwrap_err();
        assert_eq!(d.code, codes::INVALID_BASE64);
        assert!(d.detail.starts_with("content_b64"), "{}", d.detail);
    }

    #[test]
    fn missing_fields_listed_in_fixed_order() {
        let d = validate(&parse_fields([("path", "x")])).unwrap_err();
        assert_eq!(d.code, codes::MISSING_REQUIRED_FIELDS);
        assert_eq!(d.detail, "missing required fields: version, id, action");
    }

    #[test]
    fn blank_id_counts_as_missing() {
        let d = validate(&parse_fields([("version", "1"), ("id", ""), ("action", "x.y")]))
            .unwrap_err();
        assert_eq!(d.detail, "missing required fields: id");
    }

    #[test]
    fn non_ascii_id_rejected() {
        let mut f = base("fs.list", &[]);
        f.insert("id", FieldValue::Text("\u{e9}t\u{e9}".into()));
        assert_eq!(code_of(&f), codes::NON_ASCII_IN_CMD);
    }

    #[test]
    fn path_policy() {
        let no_path = parse_fields([("version", "1"), ("id", "a"), ("action", "fs.read")]);
        assert_eq!(code_of(&no_path), codes::ACTION_REQUIRES_PATH);

        let blank_path = parse_fields([
            ("version", "1"),
            ("id", "a"),
            ("action", "fs.read"),
            ("path", ""),
        ]);
        assert_eq!(code_of(&blank_path), codes::ACTION_REQUIRES_PATH);

        let op = base("operator.getInterfaceSpec", &[("path", ".")]);
        let d = validate(&op).unwrap_err();
        assert_eq!(d.code, codes::ACTION_FORBIDS_PATH);
        assert!(d.detail.starts_with("operator action"), "{}", d.detail);

        // Path policy runs before the registry lookup.
        let other = base("custom.thing", &[("path", ".")]);
        let d = validate(&other).unwrap_err();
        assert_eq!(d.code, codes::ACTION_FORBIDS_PATH);
        assert!(!d.detail.contains("operator"), "{}", d.detail);
    }

    #[test]
    fn version_must_be_one() {
        let mut f = base("fs.list", &[]);
        f.insert("version", FieldValue::Number(2.0));
        assert_eq!(code_of(&f), codes::UNSUPPORTED_VERSION);
        f.insert("version", FieldValue::Text("one".into()));
        assert_eq!(code_of(&f), codes::UNSUPPORTED_VERSION);
    }

    #[test]
    fn write_needs_string_content() {
        assert_eq!(code_of(&base("fs.write", &[])), codes::MISSING_WRITE_CONTENT);
        assert!(validate(&base("fs.write", &[("content", "")])).is_ok());
        assert!(validate(&base("fs.write", &[("content_b64", "aGk=")])).is_ok());
    }

    #[test]
    fn search_accepts_legacy_q() {
        assert_eq!(code_of(&base("fs.search", &[])), codes::MISSING_QUERY);
        assert_eq!(code_of(&base("fs.searchTree", &[("query", "")])), codes::MISSING_QUERY);
        assert!(validate(&base("fs.search", &[("q", "needle")])).is_ok());
    }

    #[test]
    fn region_checks_in_order() {
        assert_eq!(code_of(&base("fs.readRegion", &[])), codes::MISSING_MARKER_ID);
        assert_eq!(
            code_of(&base("fs.replaceRegion", &[("marker_id", "m")])),
            codes::MISSING_CONTENT_B64
        );
        assert_eq!(
            code_of(&base("fs.insertRegion", &[("marker_id", "m"), ("content_b64", "aGk=")])),
            codes::MISSING_ANCHOR
        );
        let ok = [("marker_id", "m"), ("content_b64", "aGk="), ("anchor", "fn main")];
        let mut with_occ = ok.to_vec();
        with_occ.push(("occurrence", "first"));
        assert_eq!(
            code_of(&base("fs.insertRegion", &with_occ)),
            codes::INVALID_ANCHOR_OCCURRENCE
        );
        let mut with_pos = ok.to_vec();
        with_pos.push(("position", "Before"));
        assert_eq!(
            code_of(&base("fs.insertRegion", &with_pos)),
            codes::INVALID_INSERT_POSITION
        );
        assert!(validate(&base("fs.insertRegion", &ok)).is_ok());
        assert!(validate(&base("fs.deleteRegion", &[("marker_id", "m")])).is_ok());
    }

    #[test]
    fn read_slice_params() {
        assert!(validate(&base("fs.readSlice", &[])).is_ok());
        assert!(validate(&base("fs.readSlice", &[("line", "10"), ("len", "5")])).is_ok());
        assert_eq!(
            code_of(&base("fs.readSlice", &[("start", "ten")])),
            codes::INVALID_READSLICE_PARAMS
        );
        assert_eq!(
            code_of(&base("fs.readSlice", &[("count", "")])),
            codes::INVALID_READSLICE_PARAMS
        );
    }

    #[test]
    fn edit_payloads_required() {
        assert_eq!(code_of(&base("fs.applyEdits", &[])), codes::MISSING_EDITS_B64);
        assert_eq!(code_of(&base("fs.patch", &[])), codes::MISSING_PATCH_B64);
    }

    #[test]
    fn content_newlines_rejected() {
        let mut f = base("fs.write", &[]);
        f.insert("content", FieldValue::Text("a\nb".into()));
        assert_eq!(code_of(&f), codes::CONTENT_HAS_NEWLINES);
        f.insert("content", FieldValue::Text("a\rb".into()));
        assert_eq!(code_of(&f), codes::CONTENT_HAS_NEWLINES);
    }

    #[test]
    fn base64_checked_in_field_order() {
        let f = base(
            "fs.patch",
            &[("patch_b64", "%%%%"), ("content_b64", "QR==")],
        );
        let d = validate(&f).unwrap_err();
        assert_eq!(d.code, codes::INVALID_BASE64);
        assert!(d.detail.starts_with("content_b64"), "{}", d.detail);
    }

    #[test]
    fn earlier_rule_wins() {
        // Both a missing query and a bad base64 payload: the query rule runs first.
        let f = base("fs.search", &[("content_b64", "!!")]);
        assert_eq!(code_of(&f), codes::MISSING_QUERY);
    }
}
