//! Typed commands.
//!
//! A validated [`FieldMap`] becomes a [`Command`]: the common header
//! (`version`, `id`, `action`, `path`) plus a [`Payload`] holding the
//! action-specific fields in typed form. The original field map travels
//! along so executors can reach fields this crate does not model.

use serde::{Deserialize, Serialize};

use crate::grammar::diag::Diagnostic;
use crate::grammar::fields::{FieldMap, FieldValue};
use crate::validate::{UnknownActionPolicy, validate_with_policy};

/// Aliases for the first line of an `fs.readSlice`, in priority order.
pub const SLICE_START_KEYS: &[&str] = &["start", "line", "from"];
/// Aliases for the line count of an `fs.readSlice`, in priority order.
pub const SLICE_LEN_KEYS: &[&str] = &["lines", "count", "len"];

/// Known command verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// `fs.list`
    #[serde(rename = "fs.list")]
    FsList,
    /// `fs.read`
    #[serde(rename = "fs.read")]
    FsRead,
    /// `fs.stat`
    #[serde(rename = "fs.stat")]
    FsStat,
    /// `fs.mkdir`
    #[serde(rename = "fs.mkdir")]
    FsMkdir,
    /// `fs.delete`
    #[serde(rename = "fs.delete")]
    FsDelete,
    /// `fs.write`
    #[serde(rename = "fs.write")]
    FsWrite,
    /// `fs.search`
    #[serde(rename = "fs.search")]
    FsSearch,
    /// `fs.searchTree`
    #[serde(rename = "fs.searchTree")]
    FsSearchTree,
    /// `fs.readSlice`
    #[serde(rename = "fs.readSlice")]
    FsReadSlice,
    /// `fs.readRegion`
    #[serde(rename = "fs.readRegion")]
    FsReadRegion,
    /// `fs.replaceRegion`
    #[serde(rename = "fs.replaceRegion")]
    FsReplaceRegion,
    /// `fs.deleteRegion`
    #[serde(rename = "fs.deleteRegion")]
    FsDeleteRegion,
    /// `fs.insertRegion`
    #[serde(rename = "fs.insertRegion")]
    FsInsertRegion,
    /// `fs.applyEdits`
    #[serde(rename = "fs.applyEdits")]
    FsApplyEdits,
    /// `fs.patch`
    #[serde(rename = "fs.patch")]
    FsPatch,
    /// `operator.getInterfaceSpec`
    #[serde(rename = "operator.getInterfaceSpec")]
    OperatorGetInterfaceSpec,
}

/// Registry of action names.
///
/// Adding an action means adding one entry here and one [`Payload`] arm.
const ACTION_REGISTRY: &[(&str, Action)] = &[
    ("fs.list", Action::FsList),
    ("fs.read", Action::FsRead),
    ("fs.stat", Action::FsStat),
    ("fs.mkdir", Action::FsMkdir),
    ("fs.delete", Action::FsDelete),
    ("fs.write", Action::FsWrite),
    ("fs.search", Action::FsSearch),
    ("fs.searchTree", Action::FsSearchTree),
    ("fs.readSlice", Action::FsReadSlice),
    ("fs.readRegion", Action::FsReadRegion),
    ("fs.replaceRegion", Action::FsReplaceRegion),
    ("fs.deleteRegion", Action::FsDeleteRegion),
    ("fs.insertRegion", Action::FsInsertRegion),
    ("fs.applyEdits", Action::FsApplyEdits),
    ("fs.patch", Action::FsPatch),
    ("operator.getInterfaceSpec", Action::OperatorGetInterfaceSpec),
];

impl Action {
    /// Every known action, in registry order.
    pub fn all() -> impl Iterator<Item = Action> {
        ACTION_REGISTRY.iter().map(|(_, a)| *a)
    }

    /// Look up a known action by its exact name.
    pub fn lookup(name: &str) -> Option<Action> {
        ACTION_REGISTRY
            .iter()
            .find_map(|(n, a)| (*n == name).then_some(*a))
    }

    /// Parse an action name, rejecting names outside the registry.
    pub fn parse(name: &str) -> Result<Action, Diagnostic> {
        Self::lookup(name).ok_or_else(|| Diagnostic::unknown_action(name))
    }

    /// The wire name, e.g. `fs.readSlice`.
    pub fn as_str(self) -> &'static str {
        ACTION_REGISTRY
            .iter()
            .find_map(|(n, a)| (*a == self).then_some(*n))
            .unwrap_or_default()
    }

    /// Whether the action addresses a named region of a file.
    pub fn is_region(self) -> bool {
        matches!(
            self,
            Action::FsReadRegion
                | Action::FsReplaceRegion
                | Action::FsDeleteRegion
                | Action::FsInsertRegion
        )
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `action` belongs to the filesystem namespace and so takes a `path`.
pub fn is_fs_action(action: &str) -> bool {
    action.starts_with("fs.")
}

/// Whether `action` belongs to the operator namespace.
pub fn is_operator_action(action: &str) -> bool {
    action.starts_with("operator.")
}

/// File content carried by `fs.write`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "value", rename_all = "snake_case")]
pub enum WriteBody {
    /// Single-line literal `content`.
    Text(String),
    /// `content_b64`; takes precedence when both are present.
    Base64(String),
}

/// How region markers are written as comments in the target file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum CommentStyle {
    /// `comment_line_prefix`, e.g. `//`.
    Line {
        /// Prefix placed before the marker text.
        prefix: String,
    },
    /// `comment_block_start` / `comment_block_end`, e.g. `/*` and `*/`.
    Block {
        /// Opening delimiter.
        start: String,
        /// Closing delimiter.
        end: String,
    },
}

impl CommentStyle {
    /// Read the comment style fields.
    ///
    /// `Ok(None)` when none of them is present. The line prefix and the
    /// block pair exclude each other, the pair must be complete, and a
    /// blank line prefix is rejected. The error is a diagnostic detail.
    pub fn from_fields(fields: &FieldMap) -> Result<Option<CommentStyle>, String> {
        let line = fields.get("comment_line_prefix");
        let start = fields.get("comment_block_start");
        let end = fields.get("comment_block_end");

        if line.is_some() && (start.is_some() || end.is_some()) {
            return Err(
                "comment_line_prefix cannot be combined with comment_block_start/comment_block_end"
                    .into(),
            );
        }
        match (line, start, end) {
            (Some(prefix), None, None) if prefix.is_blank() => {
                Err("comment_line_prefix must not be blank".into())
            }
            (Some(prefix), None, None) => Ok(Some(CommentStyle::Line {
                prefix: prefix.to_text().into_owned(),
            })),
            (None, Some(start), Some(end)) => Ok(Some(CommentStyle::Block {
                start: start.to_text().into_owned(),
                end: end.to_text().into_owned(),
            })),
            (None, None, None) => Ok(None),
            _ => Err("comment_block_start and comment_block_end must be given together".into()),
        }
    }
}

/// Where `fs.insertRegion` places new content relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPosition {
    /// Insert before the anchor.
    Before,
    /// Insert after the anchor.
    After,
}

impl InsertPosition {
    /// Parse the exact values `before` / `after`.
    pub fn parse(value: &FieldValue) -> Option<InsertPosition> {
        match value.as_str()? {
            "before" => Some(InsertPosition::Before),
            "after" => Some(InsertPosition::After),
            _ => None,
        }
    }
}

/// First present alias of a numeric parameter.
///
/// `Ok(None)` when no alias is present; otherwise the value must be a
/// finite number. The error is a diagnostic detail.
pub fn numeric_param(fields: &FieldMap, aliases: &[&str]) -> Result<Option<f64>, String> {
    match fields.first_present(aliases) {
        None => Ok(None),
        Some((key, value)) => value
            .as_finite_number()
            .map(Some)
            .ok_or_else(|| format!("{key} must be a finite number (got \"{value}\")")),
    }
}

/// Action-specific part of a [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// `fs.list`
    FsList,
    /// `fs.read`
    FsRead,
    /// `fs.stat`
    FsStat,
    /// `fs.mkdir`
    FsMkdir,
    /// `fs.delete`
    FsDelete,
    /// `fs.write`
    FsWrite {
        /// Content to write.
        body: WriteBody,
    },
    /// `fs.search`
    FsSearch {
        /// Search text (`query`, or legacy `q`).
        query: String,
    },
    /// `fs.searchTree`
    FsSearchTree {
        /// Search text (`query`, or legacy `q`).
        query: String,
    },
    /// `fs.readSlice`
    FsReadSlice {
        /// First line (`start` / `line` / `from`).
        start: Option<f64>,
        /// Line count (`lines` / `count` / `len`).
        lines: Option<f64>,
    },
    /// `fs.readRegion`
    FsReadRegion {
        /// Region name.
        marker_id: String,
        /// Marker comment syntax, when given.
        comment: Option<CommentStyle>,
    },
    /// `fs.replaceRegion`
    FsReplaceRegion {
        /// Region name.
        marker_id: String,
        /// New region body, base64.
        content_b64: String,
        /// Marker comment syntax, when given.
        comment: Option<CommentStyle>,
    },
    /// `fs.deleteRegion`
    FsDeleteRegion {
        /// Region name.
        marker_id: String,
        /// Marker comment syntax, when given.
        comment: Option<CommentStyle>,
    },
    /// `fs.insertRegion`
    FsInsertRegion {
        /// Name of the region to create.
        marker_id: String,
        /// Region body, base64.
        content_b64: String,
        /// Text locating the insertion point.
        anchor: String,
        /// Which match of `anchor` to use.
        occurrence: Option<f64>,
        /// Side of the anchor to insert on.
        position: Option<InsertPosition>,
        /// Marker comment syntax, when given.
        comment: Option<CommentStyle>,
    },
    /// `fs.applyEdits`
    FsApplyEdits {
        /// Encoded edit list, base64.
        edits_b64: String,
    },
    /// `fs.patch`
    FsPatch {
        /// Unified diff, base64.
        patch_b64: String,
    },
    /// `operator.getInterfaceSpec`
    OperatorGetInterfaceSpec,
    /// An action outside the registry, passed through untyped.
    Unrecognized {
        /// The action as written.
        action: String,
    },
}

impl Payload {
    /// Build the payload for `action` from a field map that passed
    /// [`validate_with_policy`]. Absent optional fields map to `None`.
    pub fn from_fields(action: &str, fields: &FieldMap) -> Payload {
        let text = |key: &str| fields.non_blank(key).unwrap_or_default();
        let b64 = |key: &str| fields.get_str(key).unwrap_or_default().to_string();
        let query = || {
            fields
                .non_blank("query")
                .or_else(|| fields.non_blank("q"))
                .unwrap_or_default()
        };
        let comment = || CommentStyle::from_fields(fields).ok().flatten();

        let Some(known) = Action::lookup(action) else {
            return Payload::Unrecognized {
                action: action.to_string(),
            };
        };
        match known {
            Action::FsList => Payload::FsList,
            Action::FsRead => Payload::FsRead,
            Action::FsStat => Payload::FsStat,
            Action::FsMkdir => Payload::FsMkdir,
            Action::FsDelete => Payload::FsDelete,
            Action::FsWrite => Payload::FsWrite {
                body: match (fields.get_str("content_b64"), fields.get_str("content")) {
                    (Some(b64), _) => WriteBody::Base64(b64.to_string()),
                    (None, Some(content)) => WriteBody::Text(content.to_string()),
                    (None, None) => WriteBody::Text(String::new()),
                },
            },
            Action::FsSearch => Payload::FsSearch { query: query() },
            Action::FsSearchTree => Payload::FsSearchTree { query: query() },
            Action::FsReadSlice => Payload::FsReadSlice {
                start: numeric_param(fields, SLICE_START_KEYS).ok().flatten(),
                lines: numeric_param(fields, SLICE_LEN_KEYS).ok().flatten(),
            },
            Action::FsReadRegion => Payload::FsReadRegion {
                marker_id: text("marker_id"),
                comment: comment(),
            },
            Action::FsReplaceRegion => Payload::FsReplaceRegion {
                marker_id: text("marker_id"),
                content_b64: b64("content_b64"),
                comment: comment(),
            },
            Action::FsDeleteRegion => Payload::FsDeleteRegion {
                marker_id: text("marker_id"),
                comment: comment(),
            },
            Action::FsInsertRegion => Payload::FsInsertRegion {
                marker_id: text("marker_id"),
                content_b64: b64("content_b64"),
                anchor: text("anchor"),
                occurrence: numeric_param(fields, &["occurrence"]).ok().flatten(),
                position: fields.get("position").and_then(InsertPosition::parse),
                comment: comment(),
            },
            Action::FsApplyEdits => Payload::FsApplyEdits {
                edits_b64: b64("edits_b64"),
            },
            Action::FsPatch => Payload::FsPatch {
                patch_b64: b64("patch_b64"),
            },
            Action::OperatorGetInterfaceSpec => Payload::OperatorGetInterfaceSpec,
        }
    }

    /// Whether the action is outside the registry.
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Payload::Unrecognized { .. })
    }
}

/// A schema-valid command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Protocol version; always 1.
    pub version: u32,
    /// Caller-chosen identifier, trimmed.
    pub id: String,
    /// Action name, trimmed.
    pub action: String,
    /// Target path, trimmed; present exactly for `fs.*` actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Typed action-specific fields.
    pub payload: Payload,
    /// Normalized field map.
    pub fields: FieldMap,
}

impl Command {
    /// Validate `fields` and build the typed command. Unknown actions are
    /// rejected.
    ///
    /// `id`, `action` and `path` are normalized to trimmed strings, both in
    /// the command header and in the carried field map.
    pub fn from_fields(fields: FieldMap) -> Result<Command, Diagnostic> {
        Self::from_fields_with_policy(fields, UnknownActionPolicy::Reject)
    }

    /// [`Command::from_fields`] with an explicit unknown-action policy. Under
    /// [`UnknownActionPolicy::Allow`] an unknown action yields
    /// [`Payload::Unrecognized`].
    pub fn from_fields_with_policy(
        mut fields: FieldMap,
        policy: UnknownActionPolicy,
    ) -> Result<Command, Diagnostic> {
        validate_with_policy(&fields, policy)?;

        let id = fields.non_blank("id").unwrap_or_default();
        let action = fields.non_blank("action").unwrap_or_default();
        let path = fields.non_blank("path");

        fields.insert("id", FieldValue::Text(id.clone()));
        fields.insert("action", FieldValue::Text(action.clone()));
        if let Some(p) = &path {
            fields.insert("path", FieldValue::Text(p.clone()));
        }

        Ok(Command {
            version: 1,
            payload: Payload::from_fields(&action, &fields),
            id,
            action,
            path,
            fields,
        })
    }

    /// The action, when it is in the registry.
    pub fn known_action(&self) -> Option<Action> {
        Action::lookup(&self.action)
    }
}
