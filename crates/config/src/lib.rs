//! Scanner configuration for OPERATOR_CMD extraction.
//!
//! The defaults are the protocol's own values, so `ScanConfig::default()` is
//! what every host should use unless it has a reason to be stricter. A
//! config file may tighten the block ceilings but never raise them above the
//! protocol maximums.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Protocol ceiling on body lines per block.
pub const MAX_BLOCK_LINES: usize = 200;
/// Protocol ceiling on characters per block (each line counts its length plus one).
pub const MAX_BLOCK_CHARS: usize = 50_000;
/// The only config schema version this crate understands.
pub const CONFIG_SCHEMA_VERSION: &str = "1";

/// Errors that can occur when loading or validating a scan config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON deserialization failed.
    #[error("invalid config JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A field value is out of its valid range.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// The name of the field that failed validation.
        field: String,
        /// A human-readable explanation of why the field value is invalid.
        reason: String,
    },
}

/// Settings that shape a single scan.
///
/// # Example
/// ```
/// let config = operator_cmd_config::ScanConfig {
///     limits: operator_cmd_config::Limits {
///         max_block_lines: 50,
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// assert_eq!(config.limits.max_block_chars, operator_cmd_config::MAX_BLOCK_CHARS);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Config schema version (currently `"1"`).
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Per-block size ceilings.
    #[serde(default)]
    pub limits: Limits,
    /// Accept blocks whose `action` is outside the known action registry as
    /// unrecognized payloads. Off by default: such blocks are
    /// `ERR_UNKNOWN_ACTION`.
    #[serde(default)]
    pub allow_unknown_actions: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            limits: Limits::default(),
            allow_unknown_actions: false,
        }
    }
}

fn default_schema_version() -> String {
    CONFIG_SCHEMA_VERSION.to_string()
}

/// Per-block size ceilings.
///
/// Invariant: `1 <= max_block_lines <= MAX_BLOCK_LINES` and
/// `1 <= max_block_chars <= MAX_BLOCK_CHARS`. [`load_config_from_str`]
/// checks it for deserialized configs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Limits {
    /// Maximum body lines in one block.
    #[serde(default = "default_max_block_lines")]
    pub max_block_lines: usize,
    /// Maximum characters in one block, counting one extra per line.
    #[serde(default = "default_max_block_chars")]
    pub max_block_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_block_lines: MAX_BLOCK_LINES,
            max_block_chars: MAX_BLOCK_CHARS,
        }
    }
}

fn default_max_block_lines() -> usize {
    MAX_BLOCK_LINES
}

fn default_max_block_chars() -> usize {
    MAX_BLOCK_CHARS
}

/// Load and validate a [`ScanConfig`] from a JSON string.
///
/// Every field is optional; omitted fields take the protocol defaults.
/// Performs structural validation after deserialization:
/// - `schema_version` must be `"1"`
/// - `limits.max_block_lines` must be in `1..=200`
/// - `limits.max_block_chars` must be in `1..=50000`
pub fn load_config_from_str(s: &str) -> Result<ScanConfig, ConfigError> {
    let config: ScanConfig = serde_json::from_str(s)?;

    if config.schema_version.trim() != CONFIG_SCHEMA_VERSION {
        return Err(ConfigError::InvalidField {
            field: "schema_version".into(),
            reason: format!(
                "unsupported version \"{}\" (expected \"{CONFIG_SCHEMA_VERSION}\")",
                config.schema_version
            ),
        });
    }

    check_ceiling(
        "limits.max_block_lines",
        config.limits.max_block_lines,
        MAX_BLOCK_LINES,
    )?;
    check_ceiling(
        "limits.max_block_chars",
        config.limits.max_block_chars,
        MAX_BLOCK_CHARS,
    )?;

    Ok(config)
}

/// Read a config file from disk and validate it with [`load_config_from_str`].
pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<ScanConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_config_from_str(&text)
}

fn check_ceiling(field: &str, value: usize, max: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidField {
            field: field.into(),
            reason: "must be > 0".into(),
        });
    }
    if value > max {
        return Err(ConfigError::InvalidField {
            field: field.into(),
            reason: format!("{value} exceeds the protocol maximum ({max})"),
        });
    }
    Ok(())
}
