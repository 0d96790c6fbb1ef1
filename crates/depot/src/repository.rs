//! The repository contract shared by every repository implementation.
//!
//! A build tool resolves components through this trait: find artifacts by
//! symbolic name and version, list what exists, and put new artifacts into
//! repositories that accept writes.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::digest::Digest;
use crate::error::RepoResult;
use crate::report::Reported;
use crate::version::Version;

/// Property key selecting a [`ResolveStrategy`] in [`RepositoryPlugin::get`].
pub const STRATEGY_PROPERTY: &str = "strategy";

/// Options steering a put.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Expected SHA-1 of the fetched bytes. A mismatch fails the put before
    /// anything is stored.
    pub digest: Option<Digest>,
    /// Allow the repository to alter the artifact while storing it.
    pub allow_artifact_change: bool,
    /// Return the digest of the artifact as stored.
    pub generate_digest: bool,
}

impl PutOptions {
    pub fn expect_digest(mut self, digest: Digest) -> Self {
        self.digest = Some(digest);
        self
    }

    pub fn generate_digest(mut self) -> Self {
        self.generate_digest = true;
        self
    }

    pub fn allow_artifact_change(mut self) -> Self {
        self.allow_artifact_change = true;
        self
    }
}

/// Outcome of a put.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutResult {
    /// Where the artifact now lives; `None` means it was not stored, for
    /// example because an identical artifact was already present.
    pub artifact: Option<Url>,
    /// Digest of the stored artifact, when requested and stored.
    pub digest: Option<Digest>,
}

impl PutResult {
    pub fn not_stored() -> Self {
        Self::default()
    }

    pub fn is_stored(&self) -> bool {
        self.artifact.is_some()
    }
}

/// Which version `get` picks among those available.
///
/// For `Highest` and `Lowest` a requested version acts as a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveStrategy {
    Lowest,
    Highest,
    Exact,
}

impl ResolveStrategy {
    /// Read the `strategy` property. Without it: exact when a version is
    /// requested, highest otherwise. Unknown values fall back the same way.
    pub fn from_properties(version: Option<&Version>, properties: &BTreeMap<String, String>) -> Self {
        let requested = properties
            .get(STRATEGY_PROPERTY)
            .map(|s| s.trim().to_ascii_lowercase());
        match requested.as_deref() {
            Some("lowest") => Self::Lowest,
            Some("highest") => Self::Highest,
            Some("exact") => Self::Exact,
            other => {
                if let Some(value) = other {
                    tracing::debug!(strategy = value, "ignoring unknown resolve strategy");
                }
                if version.is_some() {
                    Self::Exact
                } else {
                    Self::Highest
                }
            }
        }
    }
}

/// A repository of versioned artifacts.
pub trait RepositoryPlugin: Send + Sync {
    /// Store the artifact read from `stream` and refresh the index.
    ///
    /// Index problems do not fail the put; they are in the returned report.
    fn put(&self, stream: &mut dyn Read, options: &PutOptions) -> RepoResult<Reported<PutResult>>;

    /// Local file for `bsn` at `version`, or the highest version if `None`.
    fn get(
        &self,
        bsn: &str,
        version: Option<&Version>,
        properties: &BTreeMap<String, String>,
    ) -> RepoResult<Option<PathBuf>>;

    /// Distinct symbolic names whose full name matches `pattern`.
    fn list(&self, pattern: Option<&str>) -> RepoResult<BTreeSet<String>>;

    /// Versions known for `bsn`; empty if the name is absent.
    fn versions(&self, bsn: &str) -> RepoResult<BTreeSet<Version>>;

    fn can_write(&self) -> bool;

    fn name(&self) -> String;

    fn location(&self) -> String;
}
