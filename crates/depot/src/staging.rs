//! Staging: temp files that become artifacts or indexes by atomic rename.
//!
//! Every write under the repository root goes through a staging file in
//! `{root}/.staging/`, which lives on the same filesystem as its final
//! destination so `rename()` replaces the target in one step. A staging file
//! that is dropped without being persisted is deleted, so failed or
//! abandoned writes leave nothing behind.
//!
//! Layout:
//! ```text
//! {root}/
//! ├── .staging/
//! │   └── 3f2a...c1.part     # In-progress content
//! ├── org.example/
//! │   └── org.example-1.0.0.jar
//! └── index.json.gz
//! ```

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::digest::{Digest, DigestWriter};

pub const STAGING_DIR: &str = ".staging";

const COPY_BUFFER: usize = 64 * 1024;

/// A staging file that is removed on drop unless persisted.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    size: u64,
    digest: Option<Digest>,
    persisted: bool,
}

impl StagedFile {
    /// Create an empty staging file under `root`.
    pub fn create(root: &Path) -> io::Result<(Self, File)> {
        let dir = root.join(STAGING_DIR);
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.part", Uuid::new_v4().simple()));
        let file = File::create(&path)?;

        Ok((
            Self {
                path,
                size: 0,
                digest: None,
                persisted: false,
            },
            file,
        ))
    }

    /// Copy a whole stream into a new staging file, hashing the exact bytes
    /// written.
    pub fn from_reader(root: &Path, reader: &mut dyn Read) -> io::Result<Self> {
        let (mut staged, file) = Self::create(root)?;
        let mut out = BufWriter::new(file);
        let mut hasher = DigestWriter::new();
        let mut buf = vec![0u8; COPY_BUFFER];

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
            out.write_all(&buf[..n])?;
            staged.size += n as u64;
        }

        let file = out.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()?;

        staged.digest = Some(hasher.finish());
        Ok(staged)
    }

    /// Replace the staged contents, recomputing size and digest.
    pub fn rewrite(&mut self, data: &[u8]) -> io::Result<()> {
        let mut file = File::create(&self.path)?;
        file.write_all(data)?;
        file.sync_all()?;
        self.size = data.len() as u64;
        self.digest = Some(Digest::from_data(data));
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Digest of the staged bytes, computed from disk if not yet known.
    pub fn digest(&mut self) -> io::Result<Digest> {
        match self.digest {
            Some(digest) => Ok(digest),
            None => {
                let digest = Digest::from_file(&self.path)?;
                self.digest = Some(digest);
                Ok(digest)
            }
        }
    }

    /// Atomically move the staged file to `dest`, replacing whatever is there.
    pub fn persist(mut self, dest: &Path) -> io::Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&self.path, dest)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.persisted {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "failed to remove staging file");
                }
            }
        }
    }
}
