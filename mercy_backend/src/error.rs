//! Error taxonomy for the mercy tracker core.
//!
//! Backup and persistence operations report failures through these values
//! instead of aborting; callers decide whether a failure is fatal.

use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Fieldless classification of a [`TrackerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Parse,
    Io,
    Validation,
    Structural,
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// No canonical file, no backup, or no data for a user
    #[error("{0}")]
    NotFound(String),

    /// Malformed JSON on read, or a store that could not be serialized
    #[error("invalid JSON in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem failure
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input rejected before any state was touched
    #[error("{0}")]
    Validation(String),

    /// Snapshot failed its integrity check
    #[error("snapshot '{name}' failed integrity check: {reason}")]
    Structural { name: String, reason: String },
}

impl TrackerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackerError::NotFound(_) => ErrorKind::NotFound,
            TrackerError::Parse { .. } => ErrorKind::Parse,
            TrackerError::Io { .. } => ErrorKind::Io,
            TrackerError::Validation(_) => ErrorKind::Validation,
            TrackerError::Structural { .. } => ErrorKind::Structural,
        }
    }

    /// Errors caused by the caller's input rather than by the system.
    pub fn is_user_facing(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::Validation)
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return TrackerError::NotFound(format!("{} does not exist", path.display()));
        }
        TrackerError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn parse(path: &Path, source: serde_json::Error) -> Self {
        TrackerError::Parse {
            path: path.to_path_buf(),
            source,
        }
    }
}
