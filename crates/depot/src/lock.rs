//! Advisory exclusive lock around the store + regenerate sequence.
//!
//! The lock is a plain file at `{root}/.lock` locked with `flock`-style
//! semantics, so it serializes writers across threads and processes alike.
//! Readers never take it; they only ever observe files that were moved into
//! place by rename.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::FileExt;

use crate::error::{IoContext, RepoResult};

pub const LOCK_FILE: &str = ".lock";

/// Held for as long as the guard lives.
#[derive(Debug)]
pub struct RepoLock {
    file: File,
    path: PathBuf,
}

impl RepoLock {
    /// Block until the repository lock at `root` is ours.
    pub fn acquire(root: &Path) -> RepoResult<Self> {
        let path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .io_context(|| format!("failed to open repository lock {}", path.display()))?;
        file.lock_exclusive()
            .io_context(|| format!("failed to lock {}", path.display()))?;
        tracing::debug!(path = %path.display(), "acquired repository lock");
        Ok(Self { file, path })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release repository lock");
        }
    }
}
