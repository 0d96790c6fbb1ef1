//! ArtifactStore: places artifacts at deterministic paths under the root.
//!
//! Layout:
//! ```text
//! {root}/
//! ├── org.example.api/
//! │   ├── org.example.api-1.0.0.jar
//! │   └── org.example.api-1.1.0.jar
//! ├── org.example.impl/
//! │   └── org.example.impl-2.0.0.SNAPSHOT.jar
//! ├── .staging/          # In-progress writes (see staging.rs)
//! ├── .lock              # Writer lock (see lock.rs)
//! └── index.json.gz      # Written by the index generator
//! ```
//!
//! The store is the only component that writes artifacts. It writes at most
//! one file per call and only ever by renaming a fully written staging file.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::config::ConflictPolicy;
use crate::digest::Digest;
use crate::error::{IoContext, RepoError, RepoResult};
use crate::identity::{is_valid_bsn, ArtifactIdentity, IdentityExtractor};
use crate::index::ArtifactRecord;
use crate::report::{DiagnosticKind, Report, Reported};
use crate::repository::PutOptions;
use crate::staging::StagedFile;

/// Hook for stores that need to alter artifact bytes (re-signing,
/// re-packing) before persisting them.
pub trait ArtifactTransform: Send + Sync {
    /// Return replacement bytes, or `None` to store the artifact as fetched.
    fn transform(&self, identity: &ArtifactIdentity, staged: &Path) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Result of a store call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The artifact was written to `path`.
    Stored {
        identity: ArtifactIdentity,
        path: PathBuf,
        digest: Digest,
    },
    /// An artifact was already at `path` and overwrite is disabled.
    Kept {
        identity: ArtifactIdentity,
        path: PathBuf,
    },
}

/// Filesystem artifact store.
#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    overwrite: bool,
    on_conflict: ConflictPolicy,
    read_only: bool,
    extractor: Arc<dyn IdentityExtractor>,
    transform: Option<Arc<dyn ArtifactTransform>>,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("root", &self.root)
            .field("overwrite", &self.overwrite)
            .field("on_conflict", &self.on_conflict)
            .field("read_only", &self.read_only)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl ArtifactStore {
    /// Create a store at `root`. Nothing is touched on disk until the first
    /// write.
    pub fn new(root: impl Into<PathBuf>, extractor: Arc<dyn IdentityExtractor>) -> Self {
        Self {
            root: root.into(),
            overwrite: true,
            on_conflict: ConflictPolicy::Skip,
            read_only: false,
            extractor,
            transform: None,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.on_conflict = policy;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn IdentityExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_transform(mut self, transform: Arc<dyn ArtifactTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extractor(&self) -> &dyn IdentityExtractor {
        self.extractor.as_ref()
    }

    /// `{root}/{bsn}/{bsn}-{version}.{ext}`
    pub fn artifact_path(&self, identity: &ArtifactIdentity) -> PathBuf {
        self.root.join(&identity.bsn).join(format!(
            "{}.{}",
            identity.file_stem(),
            self.extractor.extension()
        ))
    }

    /// The root must exist for any operation.
    pub fn ensure_readable(&self) -> RepoResult<()> {
        match fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(RepoError::unavailable(&self.root, "not a directory")),
            Err(e) => Err(RepoError::unavailable(&self.root, e.to_string())),
        }
    }

    /// Writes additionally need a writable root and a writable store.
    pub fn ensure_writable(&self) -> RepoResult<()> {
        if self.read_only {
            return Err(RepoError::unavailable(&self.root, "repository is read-only"));
        }
        self.ensure_readable()?;
        let meta = fs::metadata(&self.root).io_context(|| format!("failed to stat {}", self.root.display()))?;
        if meta.permissions().readonly() {
            return Err(RepoError::unavailable(&self.root, "root directory is not writable"));
        }
        Ok(())
    }

    pub fn can_write(&self) -> bool {
        self.ensure_writable().is_ok()
    }

    /// Store the artifact read from `stream`.
    ///
    /// Order matters: the fetched bytes are verified against the expected
    /// digest before identity extraction, and nothing is moved into place
    /// until every check has passed.
    pub fn store(&self, stream: &mut dyn Read, options: &PutOptions) -> RepoResult<StoreOutcome> {
        self.ensure_writable()?;

        let mut staged = StagedFile::from_reader(&self.root, stream).map_err(|e| {
            if e.kind() == io::ErrorKind::PermissionDenied {
                RepoError::unavailable(&self.root, e.to_string())
            } else {
                RepoError::Io {
                    context: "failed to stage artifact".to_string(),
                    source: e,
                }
            }
        })?;

        let fetched = staged.digest().io_context(|| "failed to hash staged artifact")?;
        if let Some(expected) = options.digest {
            if expected != fetched {
                tracing::warn!(%expected, actual = %fetched, "rejecting artifact with unexpected digest");
                return Err(RepoError::DigestMismatch {
                    expected,
                    actual: fetched,
                });
            }
        }

        let identity = match self.extractor.extract(staged.path()) {
            Ok(Some(meta)) => meta.identity,
            Ok(None) => {
                return Err(RepoError::UnresolvableIdentity {
                    reason: "not a recognizable component".to_string(),
                })
            }
            Err(e) => {
                return Err(RepoError::UnresolvableIdentity {
                    reason: format!("{e:#}"),
                })
            }
        };
        if !is_valid_bsn(&identity.bsn) {
            return Err(RepoError::UnresolvableIdentity {
                reason: format!("symbolic name {:?} is not usable as a path segment", identity.bsn),
            });
        }

        if let Some(transform) = &self.transform {
            match transform.transform(&identity, staged.path()) {
                Ok(None) => {}
                Ok(Some(bytes)) => {
                    if !options.allow_artifact_change {
                        return Err(RepoError::ArtifactChangeNotAllowed {
                            identity: identity.to_string(),
                        });
                    }
                    staged
                        .rewrite(&bytes)
                        .io_context(|| "failed to rewrite staged artifact")?;
                    tracing::debug!(%identity, size = bytes.len(), "artifact changed before storing");
                }
                Err(e) => {
                    return Err(RepoError::TransformFailed {
                        identity: identity.to_string(),
                        reason: format!("{e:#}"),
                    })
                }
            }
        }

        let digest = staged.digest().io_context(|| "failed to hash staged artifact")?;
        let path = self.artifact_path(&identity);

        if !self.overwrite && path.exists() {
            let existing = Digest::from_file(&path)
                .io_context(|| format!("failed to hash existing artifact {}", path.display()))?;
            if existing == digest {
                tracing::debug!(%identity, path = %path.display(), "identical artifact already stored");
                return Ok(StoreOutcome::Kept { identity, path });
            }
            match self.on_conflict {
                ConflictPolicy::Skip => {
                    tracing::info!(%identity, path = %path.display(), "keeping existing artifact, overwrite disabled");
                    return Ok(StoreOutcome::Kept { identity, path });
                }
                ConflictPolicy::Fail => return Err(RepoError::ArtifactExists { path }),
            }
        }

        let size = staged.size();
        staged
            .persist(&path)
            .io_context(|| format!("failed to move artifact into place at {}", path.display()))?;
        tracing::info!(%identity, path = %path.display(), %digest, size, "stored artifact");

        Ok(StoreOutcome::Stored {
            identity,
            path,
            digest,
        })
    }

    /// Describe every artifact currently under the root.
    ///
    /// Files that cannot be described are skipped with a warning.
    pub fn scan(&self) -> RepoResult<Reported<Vec<ArtifactRecord>>> {
        self.ensure_readable()?;

        let suffix = format!(".{}", self.extractor.extension());
        let mut records = Vec::new();
        let mut report = Report::new();

        // No min_depth: walkdir never runs filter_entry on entries above it,
        // so hidden directories would be descended into.
        let walker = WalkDir::new(&self.root)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = entry.map_err(|e| RepoError::Io {
                context: format!("failed to list {}", self.root.display()),
                source: e.into(),
            })?;
            if entry.depth() != 2 {
                continue;
            }
            if !entry.file_type().is_file() || !entry.file_name().to_string_lossy().ends_with(&suffix) {
                continue;
            }

            match self.describe(entry.path()) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => report.warning(
                    DiagnosticKind::UnindexableArtifact,
                    format!("{} is not a recognizable component; left out of the index", entry.path().display()),
                ),
                Err(e) => report.warning(
                    DiagnosticKind::UnindexableArtifact,
                    format!("{} could not be described: {e:#}", entry.path().display()),
                ),
            }
        }

        tracing::debug!(root = %self.root.display(), artifacts = records.len(), "scanned repository");
        Ok(Reported::new(records, report))
    }

    /// Build the index record for one stored file.
    pub fn describe(&self, path: &Path) -> anyhow::Result<Option<ArtifactRecord>> {
        let Some(meta) = self.extractor.extract(path)? else {
            return Ok(None);
        };
        let size = fs::metadata(path)?.len();
        let sha1 = Digest::from_file(path)?;
        let url = relative_url(&self.root, path)?;

        Ok(Some(ArtifactRecord {
            bsn: meta.identity.bsn,
            version: meta.identity.version,
            sha1,
            size,
            url,
            properties: meta.properties,
        }))
    }
}

fn relative_url(root: &Path, path: &Path) -> anyhow::Result<String> {
    let relative = path.strip_prefix(root)?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ManifestExtractor;
    use crate::test_support::{bundle_bytes, bundle_with_entry};
    use crate::version::Version;
    use anyhow::Result;
    use tempfile::TempDir;

    fn store_at(root: &Path) -> ArtifactStore {
        ArtifactStore::new(root, Arc::new(ManifestExtractor))
    }

    fn staging_is_empty(root: &Path) -> bool {
        fs::read_dir(root.join(crate::staging::STAGING_DIR))
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }

    struct Resign;

    impl ArtifactTransform for Resign {
        fn transform(&self, _: &ArtifactIdentity, staged: &Path) -> anyhow::Result<Option<Vec<u8>>> {
            let mut bytes = fs::read(staged)?;
            bytes.extend_from_slice(b"signed");
            Ok(Some(bytes))
        }
    }

    #[test]
    fn test_store_places_artifact_deterministically() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_at(dir.path());
        let bytes = bundle_bytes("org.example", "1.2.3");

        let outcome = store.store(&mut bytes.as_slice(), &PutOptions::default())?;
        let expected = dir.path().join("org.example").join("org.example-1.2.3.jar");
        match outcome {
            StoreOutcome::Stored { identity, path, digest } => {
                assert_eq!(identity, ArtifactIdentity::new("org.example", Version::new(1, 2, 3)));
                assert_eq!(path, expected);
                assert_eq!(digest, Digest::from_data(&bytes));
            }
            other => panic!("expected stored, got {other:?}"),
        }
        assert_eq!(fs::read(&expected)?, bytes);
        assert!(staging_is_empty(dir.path()));
        Ok(())
    }

    #[test]
    fn test_overwrite_replaces_by_default() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_at(dir.path());
        store.store(&mut bundle_bytes("a", "1.0").as_slice(), &PutOptions::default())?;

        let changed = bundle_with_entry("a", "1.0", "extra.txt", b"more");
        let outcome = store.store(&mut changed.as_slice(), &PutOptions::default())?;
        assert!(matches!(outcome, StoreOutcome::Stored { .. }));
        assert_eq!(fs::read(dir.path().join("a/a-1.0.0.jar"))?, changed);
        Ok(())
    }

    #[test]
    fn test_no_overwrite_keeps_identical_artifact() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_at(dir.path()).with_overwrite(false);
        let bytes = bundle_bytes("a", "1.0");

        store.store(&mut bytes.as_slice(), &PutOptions::default())?;
        let outcome = store.store(&mut bytes.as_slice(), &PutOptions::default())?;
        assert!(matches!(outcome, StoreOutcome::Kept { .. }));
        assert!(staging_is_empty(dir.path()));
        Ok(())
    }

    #[test]
    fn test_no_overwrite_skip_keeps_different_artifact() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_at(dir.path()).with_overwrite(false);
        let original = bundle_bytes("a", "1.0");
        store.store(&mut original.as_slice(), &PutOptions::default())?;

        let changed = bundle_with_entry("a", "1.0", "extra.txt", b"more");
        let outcome = store.store(&mut changed.as_slice(), &PutOptions::default())?;
        assert!(matches!(outcome, StoreOutcome::Kept { .. }));
        assert_eq!(fs::read(dir.path().join("a/a-1.0.0.jar"))?, original);
        Ok(())
    }

    #[test]
    fn test_no_overwrite_fail_policy_rejects_different_artifact() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_at(dir.path())
            .with_overwrite(false)
            .with_conflict_policy(ConflictPolicy::Fail);
        store.store(&mut bundle_bytes("a", "1.0").as_slice(), &PutOptions::default())?;

        let changed = bundle_with_entry("a", "1.0", "extra.txt", b"more");
        let err = store
            .store(&mut changed.as_slice(), &PutOptions::default())
            .unwrap_err();
        assert!(matches!(err, RepoError::ArtifactExists { .. }));
        assert!(staging_is_empty(dir.path()));
        Ok(())
    }

    #[test]
    fn test_digest_mismatch_writes_nothing() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_at(dir.path());
        let options = PutOptions::default().expect_digest(Digest::from_data(b"something else"));

        let err = store
            .store(&mut bundle_bytes("a", "1.0").as_slice(), &options)
            .unwrap_err();
        assert!(matches!(err, RepoError::DigestMismatch { .. }));
        assert!(!dir.path().join("a").exists());
        assert!(staging_is_empty(dir.path()));
        Ok(())
    }

    #[test]
    fn test_matching_digest_is_accepted() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_at(dir.path());
        let bytes = bundle_bytes("a", "1.0");
        let options = PutOptions::default().expect_digest(Digest::from_data(&bytes));

        assert!(matches!(
            store.store(&mut bytes.as_slice(), &options)?,
            StoreOutcome::Stored { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_unrecognizable_bytes_fail() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_at(dir.path());

        let err = store
            .store(&mut &b"plain text, not a bundle"[..], &PutOptions::default())
            .unwrap_err();
        assert!(matches!(err, RepoError::UnresolvableIdentity { .. }));
        assert!(staging_is_empty(dir.path()));
        Ok(())
    }

    #[test]
    fn test_transform_requires_permission() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_at(dir.path()).with_transform(Arc::new(Resign));
        let bytes = bundle_bytes("a", "1.0");

        let err = store
            .store(&mut bytes.as_slice(), &PutOptions::default())
            .unwrap_err();
        assert!(matches!(err, RepoError::ArtifactChangeNotAllowed { .. }));
        assert!(!dir.path().join("a").exists());

        let outcome = store.store(
            &mut bytes.as_slice(),
            &PutOptions::default().allow_artifact_change(),
        )?;
        let StoreOutcome::Stored { path, digest, .. } = outcome else {
            panic!("expected stored");
        };
        let stored = fs::read(&path)?;
        assert!(stored.ends_with(b"signed"));
        assert_eq!(digest, Digest::from_data(&stored));
        Ok(())
    }

    #[test]
    fn test_expected_digest_checks_fetched_bytes_not_transformed() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_at(dir.path()).with_transform(Arc::new(Resign));
        let bytes = bundle_bytes("a", "1.0");
        let options = PutOptions::default()
            .expect_digest(Digest::from_data(&bytes))
            .allow_artifact_change();

        assert!(matches!(
            store.store(&mut bytes.as_slice(), &options)?,
            StoreOutcome::Stored { .. }
        ));
        Ok(())
    }

    #[test]
    fn test_missing_root_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = store_at(&dir.path().join("missing"));

        let err = store
            .store(&mut bundle_bytes("a", "1.0").as_slice(), &PutOptions::default())
            .unwrap_err();
        assert!(matches!(err, RepoError::Unavailable { .. }));
        assert!(!store.can_write());
    }

    #[test]
    fn test_read_only_prevents_writes() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path()).with_read_only(true);

        let err = store
            .store(&mut bundle_bytes("a", "1.0").as_slice(), &PutOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("read-only"));
        assert!(!store.can_write());
    }

    #[test]
    fn test_scan_describes_stored_artifacts() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_at(dir.path());
        store.store(&mut bundle_bytes("b", "2.0").as_slice(), &PutOptions::default())?;
        store.store(&mut bundle_bytes("a", "1.0").as_slice(), &PutOptions::default())?;
        fs::write(dir.path().join("index.json.gz"), b"not scanned")?;
        fs::create_dir_all(dir.path().join(".staging"))?;
        fs::write(dir.path().join(".staging").join("left.jar"), b"not scanned")?;
        fs::write(dir.path().join("a").join("notes.txt"), b"not scanned")?;

        let (records, report) = store.scan()?.into_parts();
        assert!(report.is_clean());
        let urls: Vec<_> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["a/a-1.0.0.jar", "b/b-2.0.0.jar"]);
        assert_eq!(records[0].sha1, Digest::from_file(&dir.path().join("a/a-1.0.0.jar"))?);
        assert_eq!(records[0].properties.get("Bundle-Name").unwrap(), "a bundle");
        Ok(())
    }

    #[test]
    fn test_scan_skips_hidden_directories() -> Result<()> {
        let dir = TempDir::new()?;
        let store = store_at(dir.path());
        store.store(&mut bundle_bytes("a", "1.0").as_slice(), &PutOptions::default())?;
        fs::create_dir_all(dir.path().join(".hidden"))?;
        fs::write(dir.path().join(".hidden").join("x-1.0.0.jar"), bundle_bytes("x", "1.0"))?;
        fs::write(dir.path().join("a").join(".a-0.1.0.jar"), bundle_bytes("a", "0.1"))?;

        let (records, report) = store.scan()?.into_parts();
        assert!(report.is_clean());
        let urls: Vec<_> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["a/a-1.0.0.jar"]);
        Ok(())
    }

    #[test]
    fn test_scan_warns_about_unrecognizable_files() -> Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("junk"))?;
        fs::write(dir.path().join("junk").join("junk-1.0.0.jar"), b"garbage")?;

        let (records, report) = store_at(dir.path()).scan()?.into_parts();
        assert!(records.is_empty());
        assert_eq!(report.warning_count(), 1);
        assert!(report.has_kind(DiagnosticKind::UnindexableArtifact));
        Ok(())
    }
}
