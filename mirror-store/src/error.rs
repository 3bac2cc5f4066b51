//! Error types for mirror-store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during snapshot operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No snapshot exists for the job.
    #[error("no snapshot for job '{name}'")]
    NotFound {
        /// Job name.
        name: String,
    },

    /// Reading, writing or removing a job's snapshot failed.
    #[error("failed to {op} snapshot for job '{name}': {source}")]
    Io {
        /// Job name.
        name: String,
        /// Operation that failed (`read`, `write`, `delete`, ...).
        op: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The snapshot directory could not be created or listed.
    #[error("snapshot directory {path}: {source}")]
    Root {
        /// Snapshot directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The snapshot directory path exists but is not a directory.
    #[error("snapshot directory '{}' is not a directory", path.display())]
    NotADirectory {
        /// Offending path.
        path: PathBuf,
    },
}

impl StoreError {
    pub(crate) fn io(name: &str, op: &'static str, source: std::io::Error) -> Self {
        Self::Io {
            name: name.to_string(),
            op,
            source,
        }
    }

    /// Map an I/O error, turning `NotFound` into [`StoreError::NotFound`].
    pub(crate) fn from_io(name: &str, op: &'static str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound {
                name: name.to_string(),
            }
        } else {
            Self::io(name, op, source)
        }
    }

    /// Whether this is a missing-snapshot error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
