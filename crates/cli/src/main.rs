//! `opcmd`: scan transcripts for OPERATOR_CMD blocks, validate field maps,
//! explain diagnostic codes, and run the search-path directory check.

mod render;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use operator_cmd_config::{ScanConfig, load_config_from_path};
use operator_cmd_core::{
    Command, FieldMap, SearchPathError, TokioProbe, check_search_path, scan_with_config,
};
use operator_cmd_diagnostics as diag;
use tracing_subscriber::EnvFilter;

use crate::render::{Format, print_summary, render_diagnostics_pretty};

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "opcmd",
    version,
    about = "Find and validate OPERATOR_CMD blocks in chat transcripts"
)]
struct Cli {
    /// Output mode: "pretty" for coloured terminal output, "json" for
    /// machine-readable JSON. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    /// Scan config JSON (block ceilings, unknown-action policy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. "debug", "operator_cmd_core=trace").
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Scan a transcript for command blocks ("-" reads stdin).
    Scan { file: String },

    /// Validate one JSON object of command fields ("-" reads stdin).
    Validate { file: String },

    /// Explain a diagnostic code (e.g. ERR_NESTED_BLOCK).
    Explain { code: String },

    /// Check that a search target is not a directory.
    CheckSearchPath { path: PathBuf },
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let format = Format::resolve_or_detect(cli.output.as_deref());

    if let Err(err) = run(cli, format) {
        match format {
            Format::Json => {
                let out = serde_json::json!({
                    "success": false,
                    "error": "command_failed",
                    "message": format!("{err:#}"),
                });
                println!("{out}");
            }
            Format::Pretty => eprintln!("error: {err:#}"),
        }
        process::exit(1);
    }
}

fn init_tracing(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli, format: Format) -> Result<()> {
    match cli.cmd {
        Cmd::Scan { file } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_scan(&file, &config, format)
        }
        Cmd::Validate { file } => cmd_validate(&file, format),
        Cmd::Explain { code } => cmd_explain(&code, format),
        Cmd::CheckSearchPath { path } => cmd_check_search_path(&path, format),
    }
}

// ── Commands ────────────────────────────────────────────────────────────

fn cmd_scan(file: &str, config: &ScanConfig, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let outcome = scan_with_config(&input, config);
    tracing::info!(
        file,
        commands = outcome.commands.len(),
        diagnostics = outcome.diagnostics.len(),
        "scanned"
    );

    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Format::Pretty => {
            // Commands to stdout, diagnostics to stderr.
            if !outcome.commands.is_empty() {
                println!("{}", serde_json::to_string_pretty(&outcome.commands)?);
            }
            render_diagnostics_pretty(&input, display_name(file), &outcome.diagnostics);
            print_summary(outcome.commands.len(), outcome.diagnostics.len());
        }
    }

    exit_on_diagnostics(outcome.diagnostics.len());
    Ok(())
}

fn cmd_validate(file: &str, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let fields: FieldMap = serde_json::from_str(&input)
        .with_context(|| format!("{}: expected a JSON object of fields", display_name(file)))?;

    let result = Command::from_fields(fields);
    match (&result, format) {
        (Ok(command), Format::Json) => {
            let out = serde_json::json!({ "ok": true, "command": command });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        (Err(d), Format::Json) => {
            let out = serde_json::json!({ "ok": false, "diagnostic": d });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        (Ok(command), Format::Pretty) => {
            println!("ok: {} ({})", command.id, command.action);
        }
        (Err(d), Format::Pretty) => {
            println!("{d}");
        }
    }

    exit_on_diagnostics(usize::from(result.is_err()));
    Ok(())
}

fn cmd_explain(code: &str, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "code": code,
                "explanation": diag::explain(code),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            use ariadne::Fmt;
            match diag::explain(code) {
                Some(text) => println!("{}: {}", code.fg(ariadne::Color::Cyan), text),
                None => println!("{code}: (no explanation available)"),
            }
        }
    }
    Ok(())
}

fn cmd_check_search_path(path: &Path, format: Format) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let refused = match runtime.block_on(check_search_path(&TokioProbe, path)) {
        Ok(()) => None,
        Err(SearchPathError::IsDirectory(d)) => Some(d),
        Err(err @ SearchPathError::Probe(_)) => return Err(err.into()),
    };

    match (&refused, format) {
        (None, Format::Json) => {
            let out = serde_json::json!({ "ok": true, "path": path.display().to_string() });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        (Some(d), Format::Json) => {
            let out = serde_json::json!({ "ok": false, "diagnostic": d });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        (None, Format::Pretty) => println!("ok: {}", path.display()),
        (Some(d), Format::Pretty) => println!("{d}"),
    }

    exit_on_diagnostics(usize::from(refused.is_some()));
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Every diagnostic is an error: exit 1 when there was any.
fn exit_on_diagnostics(count: usize) {
    if count > 0 {
        process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    let Some(path) = path else {
        return Ok(ScanConfig::default());
    };
    let config = load_config_from_path(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?config, "loaded scan config");
    Ok(config)
}

/// Read a file, or stdin when `file` is `-`.
fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(file).with_context(|| format!("failed to read {file}"))
}

fn display_name(file: &str) -> &str {
    if file == "-" { "<stdin>" } else { file }
}
