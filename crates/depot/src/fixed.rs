//! FixedIndexedRepo: a read-only repository backed by index files that some
//! other process maintains.
//!
//! Locations are local paths or `file:` URLs naming index files. Entry URLs
//! inside an index resolve against the directory holding that index, so a
//! directory written by [`LocalIndexedRepo`](crate::local::LocalIndexedRepo)
//! can be read here unchanged. When several indexes list the same artifact,
//! the first location wins.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

use crate::config::FixedConfig;
use crate::error::{IoContext, RepoError, RepoResult};
use crate::index::document::read_document;
use crate::index::snapshot::compile_pattern;
use crate::index::{IndexSnapshot, SnapshotCache};
use crate::report::Reported;
use crate::repository::{PutOptions, PutResult, RepositoryPlugin, ResolveStrategy};
use crate::version::Version;

#[derive(Debug)]
pub struct FixedIndexedRepo {
    config: FixedConfig,
    cache: SnapshotCache,
}

impl FixedIndexedRepo {
    pub fn new(config: FixedConfig) -> Self {
        Self {
            config,
            cache: SnapshotCache::new(),
        }
    }

    /// Shorthand for a repository reading a single index.
    pub fn at_location(location: impl Into<String>) -> Self {
        Self::new(FixedConfig::with_location(location))
    }

    pub fn from_properties(properties: &BTreeMap<String, String>) -> anyhow::Result<Self> {
        Ok(Self::new(FixedConfig::from_properties(properties)?))
    }

    pub fn config(&self) -> &FixedConfig {
        &self.config
    }

    /// Reload every index on the next read.
    pub fn refresh(&self) {
        self.cache.invalidate();
    }

    fn snapshot(&self) -> RepoResult<Arc<IndexSnapshot>> {
        self.cache.get_or_load(|| self.load_snapshot())
    }

    fn load_snapshot(&self) -> RepoResult<IndexSnapshot> {
        let mut snapshot = IndexSnapshot::empty();
        for location in &self.config.locations {
            let path = index_file(location)?;
            load_into(&mut snapshot, &path)?;
        }
        tracing::debug!(
            locations = self.config.locations.len(),
            artifacts = snapshot.len(),
            "loaded fixed indexes"
        );

        Ok(snapshot)
    }
}

/// Turn a configured location into the path of an index file.
fn index_file(location: &str) -> RepoResult<PathBuf> {
    match Url::parse(location) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|()| RepoError::unavailable(location, "file URL has no local path")),
        // Single letters are Windows drive prefixes, not schemes.
        Ok(url) if url.scheme().len() > 1 => Err(RepoError::unavailable(
            location,
            format!("unsupported location scheme {}", url.scheme()),
        )),
        _ => Ok(PathBuf::from(location)),
    }
}

fn load_into(snapshot: &mut IndexSnapshot, path: &Path) -> RepoResult<()> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) => return Err(RepoError::unavailable(path, format!("cannot open index: {e}"))),
    };
    let doc = read_document(&mut file).map_err(|e| RepoError::IndexCorrupt {
        path: path.to_path_buf(),
        reason: format!("{e:#}"),
    })?;

    let base = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().io_context(|| "failed to read current directory")?,
    };
    snapshot.extend(&base, doc);
    Ok(())
}

impl RepositoryPlugin for FixedIndexedRepo {
    fn put(&self, _stream: &mut dyn Read, _options: &PutOptions) -> RepoResult<Reported<PutResult>> {
        Err(RepoError::unavailable(
            self.location(),
            "fixed index repositories are read-only",
        ))
    }

    fn get(
        &self,
        bsn: &str,
        version: Option<&Version>,
        properties: &BTreeMap<String, String>,
    ) -> RepoResult<Option<PathBuf>> {
        let snapshot = self.snapshot()?;
        let strategy = ResolveStrategy::from_properties(version, properties);
        Ok(snapshot
            .resolve(bsn, version, strategy)
            .filter(|found| found.path.exists())
            .map(|found| found.path.clone()))
    }

    fn list(&self, pattern: Option<&str>) -> RepoResult<BTreeSet<String>> {
        let pattern = compile_pattern(pattern)?;
        Ok(self.snapshot()?.names(pattern.as_ref()))
    }

    fn versions(&self, bsn: &str) -> RepoResult<BTreeSet<Version>> {
        Ok(self.snapshot()?.versions(bsn))
    }

    fn can_write(&self) -> bool {
        false
    }

    fn name(&self) -> String {
        self.config
            .name
            .clone()
            .unwrap_or_else(|| self.location())
    }

    fn location(&self) -> String {
        self.config.locations.join(",")
    }
}
