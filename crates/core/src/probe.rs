//! Search-target directory check.
//!
//! `fs.search` addresses a single file. Whether a path is a directory is a
//! host question, so the check goes through [`DirectoryProbe`]; the crate
//! ships [`TokioProbe`] for native hosts.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::command::{Command, Payload};
use crate::grammar::diag::{Diagnostic, codes};

/// A probe failure other than "path does not exist".
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Metadata lookup failed.
    #[error("failed to stat {path}: {source}")]
    Io {
        /// Path being probed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Why a search path was refused.
#[derive(Debug, Error)]
pub enum SearchPathError {
    /// The path names a directory.
    #[error("{0}")]
    IsDirectory(Diagnostic),
    /// The probe itself failed.
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

impl SearchPathError {
    /// The diagnostic, when the failure is a protocol violation.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            SearchPathError::IsDirectory(d) => Some(d),
            SearchPathError::Probe(_) => None,
        }
    }
}

/// Asynchronous "is this path a directory" query.
pub trait DirectoryProbe {
    /// `Ok(true)` for an existing directory, `Ok(false)` for anything else,
    /// including a path that does not exist.
    fn is_dir(&self, path: &Path) -> impl Future<Output = Result<bool, ProbeError>> + Send;
}

/// [`DirectoryProbe`] backed by `tokio::fs::metadata`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProbe;

impl DirectoryProbe for TokioProbe {
    async fn is_dir(&self, path: &Path) -> Result<bool, ProbeError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ProbeError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Refuse a search target that is a directory with `ERR_SEARCH_PATH_IS_DIR`.
pub async fn check_search_path<P: DirectoryProbe + ?Sized>(
    probe: &P,
    path: &Path,
) -> Result<(), SearchPathError> {
    if !probe.is_dir(path).await? {
        return Ok(());
    }
    tracing::debug!(path = %path.display(), "search target is a directory");
    Err(SearchPathError::IsDirectory(
        Diagnostic::new(
            codes::SEARCH_PATH_IS_DIR,
            format!(
                "search path \"{}\" is a directory; fs.search needs a file (use fs.searchTree for directories)",
                path.display()
            ),
        )
        .with_context(ctx!("path" => path.display().to_string())),
    ))
}

/// Run the directory check for an accepted `fs.search` command, resolving
/// its path against `root`. Other commands pass.
pub async fn check_command<P: DirectoryProbe + ?Sized>(
    probe: &P,
    root: &Path,
    command: &Command,
) -> Result<(), SearchPathError> {
    match (&command.payload, command.path.as_deref()) {
        (Payload::FsSearch { .. }, Some(path)) => {
            check_search_path(probe, &root.join(path)).await
        }
        _ => Ok(()),
    }
}
