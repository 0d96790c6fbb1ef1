//! In-memory view of a parsed index, answering list/versions/get.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use url::Url;

use super::document::{ArtifactRecord, IndexDocument};
use crate::repository::ResolveStrategy;
use crate::version::Version;

/// An index entry with its location resolved to a local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    pub record: ArtifactRecord,
}

#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    entries: BTreeMap<String, BTreeMap<Version, ResolvedArtifact>>,
}

impl IndexSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve every record of `doc` against `base`, the directory that
    /// holds the index file.
    pub fn from_document(base: &Path, doc: IndexDocument) -> Self {
        let mut snapshot = Self::empty();
        snapshot.extend(base, doc);
        snapshot
    }

    /// Add records from another index. Entries already present win.
    pub fn extend(&mut self, base: &Path, doc: IndexDocument) {
        for record in doc.resources {
            let path = resolve_location(base, &record.url);
            self.entries
                .entry(record.bsn.clone())
                .or_default()
                .entry(record.version.clone())
                .or_insert(ResolvedArtifact { path, record });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct symbolic names, optionally filtered by a full-name match.
    pub fn names(&self, pattern: Option<&Regex>) -> BTreeSet<String> {
        self.entries
            .keys()
            .filter(|bsn| pattern.map_or(true, |re| re.is_match(bsn)))
            .cloned()
            .collect()
    }

    pub fn versions(&self, bsn: &str) -> BTreeSet<Version> {
        self.entries
            .get(bsn)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn resolve(
        &self,
        bsn: &str,
        version: Option<&Version>,
        strategy: ResolveStrategy,
    ) -> Option<&ResolvedArtifact> {
        let versions = self.entries.get(bsn)?;
        match strategy {
            ResolveStrategy::Exact => versions.get(version?),
            ResolveStrategy::Highest => match version {
                Some(floor) => versions.range(floor.clone()..).next_back().map(|(_, a)| a),
                None => versions.values().next_back(),
            },
            ResolveStrategy::Lowest => match version {
                Some(floor) => versions.range(floor.clone()..).next().map(|(_, a)| a),
                None => versions.values().next(),
            },
        }
    }
}

/// Compile a name filter that must match the whole symbolic name.
///
/// The pattern is compiled on its own first, so only a pattern with balanced
/// groups ever gets wrapped in the anchors.
pub fn compile_pattern(pattern: Option<&str>) -> Result<Option<Regex>, regex::Error> {
    pattern
        .map(|p| {
            Regex::new(p)?;
            Regex::new(&format!("^(?:{p})$"))
        })
        .transpose()
}

/// The cached snapshot of a repository plus a generation counter.
///
/// `invalidate` bumps the generation, and a load that started under an older
/// generation is handed to its caller but never cached.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    state: RwLock<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    snapshot: Option<Arc<IndexSnapshot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached snapshot, or run `load` and cache its result if no
    /// invalidation happened in the meantime.
    pub fn get_or_load<E>(
        &self,
        load: impl FnOnce() -> Result<IndexSnapshot, E>,
    ) -> Result<Arc<IndexSnapshot>, E> {
        let generation = {
            let state = self.state.read();
            if let Some(snapshot) = &state.snapshot {
                return Ok(snapshot.clone());
            }
            state.generation
        };

        let loaded = Arc::new(load()?);

        let mut state = self.state.write();
        if state.generation == generation {
            state.snapshot = Some(loaded.clone());
        } else {
            tracing::debug!("index changed while loading; not caching the loaded snapshot");
        }
        Ok(loaded)
    }

    /// Drop the cached snapshot; loads already in flight will not be cached.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.generation = state.generation.wrapping_add(1);
        state.snapshot = None;
    }

    #[cfg(test)]
    fn is_cached(&self) -> bool {
        self.state.read().snapshot.is_some()
    }
}

fn resolve_location(base: &Path, location: &str) -> PathBuf {
    if let Ok(url) = Url::parse(location) {
        if url.scheme() == "file" {
            if let Ok(path) = url.to_file_path() {
                return path;
            }
        }
    }
    location
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .fold(base.to_path_buf(), |path, segment| path.join(segment))
}
