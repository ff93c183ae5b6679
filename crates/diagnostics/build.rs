//! Build script for generating diagnostic code data structures at compile time.
//!
//! This script reads `spec/diagnostics.json` and generates Rust files:
//! - `generated_codes.rs`: public constants mapping constant names to code strings
//! - `generated_explain.rs`: a match expression mapping codes to their descriptions
//! - `generated_all.rs`: the full ordered list of codes

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

const CODE_PREFIX: &str = "ERR_";
const STAGES: &[&str] = &["scan", "block", "fields", "host"];

fn main() {
    let spec_path = Path::new("spec/diagnostics.json");
    println!("cargo:rerun-if-changed={}", spec_path.display());

    let raw = fs::read_to_string(spec_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", spec_path.display()));

    let spec: serde_json::Value =
        serde_json::from_str(&raw).expect("failed to parse diagnostics.json as JSON");

    let diagnostics = spec["diagnostics"]
        .as_array()
        .expect("diagnostics.json: expected `diagnostics` array");

    let out_dir = env::var("OUT_DIR").unwrap();
    let out_path = Path::new(&out_dir);

    // ── Duplicate / validity checks ─────────────────────────────────────
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_names: HashSet<String> = HashSet::new();

    // ── generated_codes.rs ──────────────────────────────────────────────
    let mut codes = String::from("// Auto-generated from spec/diagnostics.json. DO NOT EDIT.\n\n");
    let mut all = String::from("&[\n");

    for (i, entry) in diagnostics.iter().enumerate() {
        let id = entry["id"]
            .as_str()
            .unwrap_or_else(|| panic!("diagnostics[{i}] missing `id`"));
        let const_name = entry["constName"]
            .as_str()
            .unwrap_or_else(|| panic!("diagnostics[{i}] (id={id}) missing `constName`"));
        let summary = entry["summary"]
            .as_str()
            .unwrap_or_else(|| panic!("diagnostics[{i}] (id={id}) missing `summary`"));
        let stage = entry["stage"]
            .as_str()
            .unwrap_or_else(|| panic!("diagnostics[{i}] (id={id}) missing `stage`"));

        assert!(
            is_screaming_snake(const_name),
            "diagnostics[{i}] (id={id}): constName '{const_name}' is not a valid SCREAMING_SNAKE_CASE identifier"
        );
        // Codes are part of the wire contract: ERR_ followed by the const name.
        assert_eq!(
            id,
            format!("{CODE_PREFIX}{const_name}"),
            "diagnostics[{i}]: id '{id}' does not match constName '{const_name}'"
        );
        assert!(
            STAGES.contains(&stage),
            "diagnostics[{i}] (id={id}): unknown stage '{stage}'"
        );

        assert!(
            seen_ids.insert(id.to_string()),
            "diagnostics[{i}]: duplicate id '{id}'"
        );
        assert!(
            seen_names.insert(const_name.to_string()),
            "diagnostics[{i}] (id={id}): duplicate constName '{const_name}'"
        );

        codes.push_str(&format!("/// {summary}\n"));
        codes.push_str(&format!("pub const {const_name}: &str = \"{id}\";\n\n"));
        all.push_str(&format!("    {const_name},\n"));
    }
    all.push_str("]\n");

    fs::write(out_path.join("generated_codes.rs"), &codes)
        .expect("failed to write generated_codes.rs");
    fs::write(out_path.join("generated_all.rs"), &all).expect("failed to write generated_all.rs");

    // ── generated_explain.rs ────────────────────────────────────────────
    let mut explain = String::from("match id {\n");

    for (i, entry) in diagnostics.iter().enumerate() {
        let id = entry["id"].as_str().unwrap();
        let description = entry["description"]
            .as_str()
            .unwrap_or_else(|| panic!("diagnostics[{i}] (id={id}) missing `description`"));
        let escaped = escape_rust_string_literal(description);
        explain.push_str(&format!("    \"{id}\" => Some(\"{escaped}\"),\n"));
    }

    explain.push_str("    _ => None,\n}\n");

    fs::write(out_path.join("generated_explain.rs"), &explain)
        .expect("failed to write generated_explain.rs");
}

fn is_screaming_snake(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
        && name.as_bytes()[0].is_ascii_uppercase()
}

fn escape_rust_string_literal(value: &str) -> String {
    value.chars().flat_map(char::escape_default).collect()
}
