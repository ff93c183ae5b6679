//! Integration tests for the field validator and typed payloads.

mod common;

use base64::Engine as _;
use common::{block, single_diag};
use operator_cmd_core::validate::{B64_FIELDS, decode_canonical};
use operator_cmd_core::{
    Command, CommentStyle, FieldMap, FieldValue, Payload, codes, decode_b64_field, parse_fields,
    scan, validate,
};
use pretty_assertions::assert_eq;

fn fields(pairs: &[(&'static str, &'static str)]) -> FieldMap {
    parse_fields(pairs.iter().copied())
}

#[test]
fn write_content_with_newline_rejected() {
    let mut f = fields(&[
        ("version", "1"),
        ("id", "w"),
        ("action", "fs.write"),
        ("path", "a.txt"),
    ]);
    f.insert("content", FieldValue::Text("line one\nline two".into()));
    let d = validate(&f).unwrap_err();
    assert_eq!(d.code, codes::CONTENT_HAS_NEWLINES);
}

#[test]
fn apply_edits_with_invalid_base64_names_field() {
    let out = scan(&block(&[
        "version: 1",
        "id: e",
        "action: fs.applyEdits",
        "path: src/main.rs",
        "edits_b64: not-base64",
    ]));
    let d = single_diag(&out, codes::INVALID_BASE64);
    assert!(d.detail.contains("edits_b64"), "{}", d.detail);
}

#[test]
fn unregistered_action_is_rejected_on_its_own() {
    let f = fields(&[
        ("version", "1"),
        ("id", "x"),
        ("action", "fs.teleport"),
        ("path", "/etc"),
    ]);
    let d = validate(&f).unwrap_err();
    assert_eq!(d.code, codes::UNKNOWN_ACTION);
    assert_eq!(d.to_string(), operator_cmd_core::format_unknown_action("fs.teleport"));
}

#[test]
fn boolean_b64_payload_is_not_content() {
    let out = scan(&block(&[
        "version: 1",
        "id: r",
        "action: fs.replaceRegion",
        "path: src/lib.rs",
        "marker_id: imports",
        "content_b64: true",
    ]));
    assert!(out.commands.is_empty());
    single_diag(&out, codes::MISSING_CONTENT_B64);

    // Same typing rule as fs.write content: a boolean is not a payload.
    let out = scan(&block(&[
        "version: 1",
        "id: w",
        "action: fs.write",
        "path: a.txt",
        "content_b64: false",
    ]));
    single_diag(&out, codes::MISSING_WRITE_CONTENT);
}

#[test]
fn operator_action_with_path_has_specific_detail() {
    let f = fields(&[
        ("version", "1"),
        ("id", "o"),
        ("action", "operator.getInterfaceSpec"),
        ("path", "."),
    ]);
    let d = validate(&f).unwrap_err();
    assert_eq!(d.code, codes::ACTION_FORBIDS_PATH);
    assert_eq!(
        d.detail,
        "operator action \"operator.getInterfaceSpec\" must not include path"
    );
}

#[test]
fn validate_from_json_field_map() {
    let f: FieldMap = serde_json::from_str(
        r#"{"version": 1, "id": "j", "action": "fs.readSlice", "path": "a", "start": "5", "lines": 20}"#,
    )
    .unwrap();
    assert!(validate(&f).is_ok());
    let cmd = Command::from_fields(f).unwrap();
    assert_eq!(
        cmd.payload,
        Payload::FsReadSlice {
            start: Some(5.0),
            lines: Some(20.0)
        }
    );
}

#[test]
fn json_version_string_is_unsupported() {
    let f: FieldMap =
        serde_json::from_str(r#"{"version": "1", "id": "j", "action": "fs.list", "path": "a"}"#)
            .unwrap();
    assert_eq!(validate(&f).unwrap_err().code, codes::UNSUPPORTED_VERSION);
}

#[test]
fn boolean_content_is_not_string_content() {
    let out = scan(&block(&[
        "version: 1",
        "id: b",
        "action: fs.write",
        "path: flag.txt",
        "content: true",
    ]));
    single_diag(&out, codes::MISSING_WRITE_CONTENT);
}

#[test]
fn comment_style_applies_to_every_action() {
    let out = scan(&block(&[
        "version: 1",
        "id: c",
        "action: fs.read",
        "path: a.rs",
        "comment_line_prefix: //",
        "comment_block_start: /*",
        "comment_block_end: */",
    ]));
    single_diag(&out, codes::INVALID_COMMENT_STYLE);
}

#[test]
fn replace_region_with_block_comments() {
    let out = scan(&block(&[
        "version: 1",
        "id: r",
        "action: fs.replaceRegion",
        "path: style.css",
        "marker_id: theme",
        "content_b64: Ym9keSB7fQ==",
        "comment_block_start: /*",
        "comment_block_end: */",
    ]));
    assert!(out.is_clean(), "{:?}", out.diagnostics);
    assert_eq!(
        out.commands[0].payload,
        Payload::FsReplaceRegion {
            marker_id: "theme".into(),
            content_b64: "Ym9keSB7fQ==".into(),
            comment: Some(CommentStyle::Block {
                start: "/*".into(),
                end: "*/".into()
            }),
        }
    );
}

#[test]
fn accepted_b64_fields_round_trip() {
    let out = scan(&block(&[
        "version: 1",
        "id: p",
        "action: fs.patch",
        "path: lib.rs",
        "patch_b64: LS0tIGEKKysrIGIK",
        "content_b64: YQ==",
    ]));
    assert!(out.is_clean(), "{:?}", out.diagnostics);
    let cmd = &out.commands[0];
    for key in B64_FIELDS {
        let Some(value) = cmd.fields.get_str(key) else {
            continue;
        };
        let bytes = decode_b64_field(&cmd.fields, key).unwrap().unwrap();
        let again = base64::engine::general_purpose::STANDARD.encode(&bytes);
        assert_eq!(again.trim_end_matches('='), value.trim_end_matches('='));
    }
    assert_eq!(
        decode_b64_field(&cmd.fields, "patch_b64").unwrap().unwrap(),
        b"--- a\n+++ b\n"
    );
}

#[test]
fn unpadded_canonical_value_is_accepted_only_with_valid_length() {
    assert!(decode_canonical("YQ").is_err());
    assert!(decode_canonical("YQ==").is_ok());
}

#[test]
fn first_failing_rule_wins_across_groups() {
    // Unsupported version and a missing query: version is checked first.
    let f = fields(&[
        ("version", "3"),
        ("id", "s"),
        ("action", "fs.search"),
        ("path", "a.txt"),
    ]);
    assert_eq!(validate(&f).unwrap_err().code, codes::UNSUPPORTED_VERSION);
}

#[test]
fn insert_region_full_payload_from_scan() {
    let out = scan(&block(&[
        "version: 1",
        "id: i",
        "action: fs.insertRegion",
        "path: main.py",
        "marker_id: helpers",
        "content_b64: ZGVmIGYoKTogcGFzcwo=",
        "anchor: if __name__",
        "position: before",
        "comment_line_prefix: #",
    ]));
    assert!(out.is_clean(), "{:?}", out.diagnostics);
    let Payload::FsInsertRegion {
        anchor, position, ..
    } = &out.commands[0].payload
    else {
        panic!("unexpected payload: {:?}", out.commands[0].payload);
    };
    assert_eq!(anchor, "if __name__");
    assert_eq!(*position, Some(operator_cmd_core::InsertPosition::Before));
}
