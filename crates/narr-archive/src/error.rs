//! Error types for the NARR archive crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while synchronizing or reading the archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to list remote archive: {0}")]
    RemoteList(String),

    #[error("Transfer of {url} failed after {attempts} attempt(s): {reason}")]
    TransferFailed {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Remote file not found: {0}")]
    NotFound(String),

    #[error("Access to remote file forbidden: {0}")]
    Forbidden(String),

    #[error("Extraction failed [{command}]: {detail}{}", format_output(.output))]
    ExtractionFailed {
        command: String,
        detail: String,
        output: String,
    },

    #[error("Failed to archive {}: {reason}", .path.display())]
    Archive { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid scene metadata: {0}")]
    Metadata(String),

    #[error("Required archive files are missing: {}", format_paths(.0))]
    MissingArchiveFiles(Vec<PathBuf>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// True for remote outcomes meaning the slice will not become available
    /// by retrying (HTTP 404 and 403).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ArchiveError::NotFound(_) | ArchiveError::Forbidden(_))
    }
}

fn format_output(output: &str) -> String {
    if output.trim().is_empty() {
        String::new()
    } else {
        format!(" Stdout/Stderr is: {}", output.trim())
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
