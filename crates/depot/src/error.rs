//! Hard failures of repository operations.
//!
//! Index-generation problems are not here: they are diagnostics in a
//! [`Report`](crate::report::Report) and never fail an otherwise successful put.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::digest::Digest;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("repository unavailable at {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("digest mismatch: expected {expected}, fetched artifact hashes to {actual}")]
    DigestMismatch { expected: Digest, actual: Digest },

    #[error("artifact {identity} would have to change to be stored, and changes are not allowed")]
    ArtifactChangeNotAllowed { identity: String },

    #[error("cannot determine artifact identity: {reason}")]
    UnresolvableIdentity { reason: String },

    #[error("a different artifact already exists at {path} and overwrite is disabled")]
    ArtifactExists { path: PathBuf },

    #[error("artifact transform failed for {identity}: {reason}")]
    TransformFailed { identity: String, reason: String },

    #[error("invalid name pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("index at {path} is corrupt: {reason}")]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl RepoError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Attach a context message to I/O errors, like `anyhow::Context` but typed.
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, f: F) -> RepoResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F, S>(self, f: F) -> RepoResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| RepoError::Io {
            context: f().into(),
            source,
        })
    }
}
