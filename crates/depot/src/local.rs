//! LocalIndexedRepo: a writable repository that keeps an index of its own
//! artifacts.
//!
//! A put stores the artifact and then rebuilds the whole index from the file
//! listing. The artifact is durable as soon as the store step succeeds; index
//! trouble after that point only shows up in the returned report. Reads never
//! scan the filesystem: they consult the parsed index, so an artifact that
//! failed to make it into the index is invisible until a later regeneration
//! picks it up.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

use crate::config::RepoConfig;
use crate::error::{IoContext, RepoError, RepoResult};
use crate::identity::{IdentityExtractor, ManifestExtractor};
use crate::index::document::read_document;
use crate::index::json::COMPRESSED_INDEX_FILE;
use crate::index::snapshot::compile_pattern;
use crate::index::{
    regenerate_index, GeneratorContext, GeneratorRegistry, IndexOutcome, IndexSnapshot, SnapshotCache,
};
use crate::lock::RepoLock;
use crate::report::{DiagnosticKind, Report, Reported};
use crate::repository::{PutOptions, PutResult, RepositoryPlugin, ResolveStrategy};
use crate::store::{ArtifactStore, ArtifactTransform, StoreOutcome};
use crate::version::Version;

pub struct LocalIndexedRepo {
    config: RepoConfig,
    store: ArtifactStore,
    registry: GeneratorRegistry,
    cache: SnapshotCache,
}

impl std::fmt::Debug for LocalIndexedRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIndexedRepo")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl LocalIndexedRepo {
    /// Open a repository with the built-in generators.
    pub fn new(config: RepoConfig) -> Self {
        Self::with_registry(config, GeneratorRegistry::with_defaults())
    }

    /// Open a repository that selects its generator from `registry`.
    pub fn with_registry(config: RepoConfig, registry: GeneratorRegistry) -> Self {
        let store = ArtifactStore::new(config.local.clone(), Arc::new(ManifestExtractor))
            .with_overwrite(config.overwrite)
            .with_conflict_policy(config.on_conflict)
            .with_read_only(config.read_only);

        tracing::debug!(
            root = %config.local.display(),
            index_type = %config.index_type,
            overwrite = config.overwrite,
            "opened local indexed repository"
        );

        Self {
            config,
            store,
            registry,
            cache: SnapshotCache::new(),
        }
    }

    /// Configure from plugin string properties; see [`RepoConfig::from_properties`].
    pub fn from_properties(
        properties: &BTreeMap<String, String>,
        registry: GeneratorRegistry,
    ) -> anyhow::Result<Self> {
        Ok(Self::with_registry(RepoConfig::from_properties(properties)?, registry))
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn IdentityExtractor>) -> Self {
        self.store = self.store.with_extractor(extractor);
        self
    }

    pub fn with_transform(mut self, transform: Arc<dyn ArtifactTransform>) -> Self {
        self.store = self.store.with_transform(transform);
        self
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    /// Where the configured generator keeps its index.
    pub fn index_path(&self) -> PathBuf {
        let file_name = self
            .registry
            .select(&self.config.index_type)
            .map(|g| g.file_name(&self.config.options))
            .unwrap_or_else(|| COMPRESSED_INDEX_FILE.to_string());
        self.root().join(file_name)
    }

    /// Rebuild the index from the files on disk without storing anything.
    pub fn reindex(&self) -> RepoResult<Reported<IndexOutcome>> {
        self.store.ensure_writable()?;
        let _lock = RepoLock::acquire(self.root())?;
        Ok(self.regenerate())
    }

    /// Forget the cached index; the next read loads it from disk.
    pub fn refresh(&self) {
        self.cache.invalidate();
    }

    /// Scan and regenerate. Caller holds the repository lock.
    fn regenerate(&self) -> Reported<IndexOutcome> {
        let mut report = Report::new();

        let artifacts = match self.store.scan() {
            Ok(scanned) => {
                let (artifacts, scan_report) = scanned.into_parts();
                report.absorb(scan_report);
                artifacts
            }
            Err(e) => {
                report.error(
                    DiagnosticKind::ScanFailed,
                    format!("failed to list artifacts for the index: {e}"),
                );
                return Reported::new(IndexOutcome::Unchanged, report);
            }
        };

        let name = self.config.name.as_deref();
        let ctx = GeneratorContext {
            root: self.root(),
            name,
            options: &self.config.options,
        };
        let (outcome, generate_report) =
            regenerate_index(&self.registry, &self.config.index_type, &artifacts, &ctx);
        report.absorb(generate_report);

        if matches!(outcome, IndexOutcome::Replaced(_)) {
            self.refresh();
        }
        Reported::new(outcome, report)
    }

    fn snapshot(&self) -> RepoResult<Arc<IndexSnapshot>> {
        self.cache.get_or_load(|| self.load_snapshot())
    }

    fn load_snapshot(&self) -> RepoResult<IndexSnapshot> {
        self.store.ensure_readable()?;

        let path = self.index_path();
        if !path.exists() {
            tracing::debug!(index = %path.display(), "no index yet");
            return Ok(IndexSnapshot::empty());
        }

        let mut file = File::open(&path).io_context(|| format!("failed to open index {}", path.display()))?;
        let parsed = match self.registry.select(&self.config.index_type) {
            Some(generator) => generator.read(&mut file),
            None => read_document(&mut file),
        };
        let doc = parsed.map_err(|e| RepoError::IndexCorrupt {
            path: path.clone(),
            reason: format!("{e:#}"),
        })?;

        tracing::debug!(index = %path.display(), artifacts = doc.resources.len(), "loaded index");
        Ok(IndexSnapshot::from_document(self.root(), doc))
    }
}

impl RepositoryPlugin for LocalIndexedRepo {
    fn put(&self, stream: &mut dyn Read, options: &PutOptions) -> RepoResult<Reported<PutResult>> {
        self.store.ensure_writable()?;
        let _lock = RepoLock::acquire(self.root())?;

        match self.store.store(stream, options)? {
            StoreOutcome::Kept { identity, path } => {
                tracing::debug!(%identity, path = %path.display(), "artifact not stored");
                Ok(Reported::clean(PutResult::not_stored()))
            }
            StoreOutcome::Stored { path, digest, .. } => {
                let artifact = file_url(&path)?;
                let (_, report) = self.regenerate().into_parts();
                Ok(Reported::new(
                    PutResult {
                        artifact: Some(artifact),
                        digest: options.generate_digest.then_some(digest),
                    },
                    report,
                ))
            }
        }
    }

    fn get(
        &self,
        bsn: &str,
        version: Option<&Version>,
        properties: &BTreeMap<String, String>,
    ) -> RepoResult<Option<PathBuf>> {
        let snapshot = self.snapshot()?;
        let strategy = ResolveStrategy::from_properties(version, properties);
        let Some(found) = snapshot.resolve(bsn, version, strategy) else {
            return Ok(None);
        };
        if !found.path.exists() {
            tracing::warn!(
                bsn,
                version = %found.record.version,
                path = %found.path.display(),
                "indexed artifact is missing on disk"
            );
            return Ok(None);
        }
        Ok(Some(found.path.clone()))
    }

    fn list(&self, pattern: Option<&str>) -> RepoResult<BTreeSet<String>> {
        let pattern = compile_pattern(pattern)?;
        Ok(self.snapshot()?.names(pattern.as_ref()))
    }

    fn versions(&self, bsn: &str) -> RepoResult<BTreeSet<Version>> {
        Ok(self.snapshot()?.versions(bsn))
    }

    fn can_write(&self) -> bool {
        self.store.can_write()
    }

    fn name(&self) -> String {
        self.config.display_name()
    }

    fn location(&self) -> String {
        self.root().display().to_string()
    }
}

fn file_url(path: &Path) -> RepoResult<Url> {
    let absolute = std::path::absolute(path)
        .io_context(|| format!("failed to resolve {}", path.display()))?;
    Url::from_file_path(&absolute)
        .map_err(|()| RepoError::unavailable(&absolute, "path cannot be expressed as a file URL"))
}
