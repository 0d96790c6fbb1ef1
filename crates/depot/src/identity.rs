//! Artifact identity and the metadata extraction seam.
//!
//! The repository never decides on its own what an artifact is called. It
//! hands the staged bytes to an [`IdentityExtractor`], which answers with a
//! symbolic name and version, or says the bytes are not a recognizable
//! component.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::version::Version;

pub const BUNDLE_SYMBOLIC_NAME: &str = "Bundle-SymbolicName";
pub const BUNDLE_VERSION: &str = "Bundle-Version";
const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

/// `(symbolic name, version)`: the unique key of an artifact in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    pub bsn: String,
    pub version: Version,
}

impl ArtifactIdentity {
    pub fn new(bsn: impl Into<String>, version: Version) -> Self {
        Self {
            bsn: bsn.into(),
            version,
        }
    }

    /// File stem used on disk: `<bsn>-<version>`.
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.bsn, self.version)
    }
}

impl fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.bsn, self.version)
    }
}

/// What an extractor learned about an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub identity: ArtifactIdentity,
    /// Descriptive properties carried into the index.
    pub properties: BTreeMap<String, String>,
}

/// Determines the identity of staged artifact bytes.
pub trait IdentityExtractor: Send + Sync {
    /// Inspect the file at `path`.
    ///
    /// Returns `Ok(None)` when the file is readable but not a recognizable
    /// component.
    fn extract(&self, path: &Path) -> Result<Option<ArtifactMetadata>>;

    /// File extension used for stored artifacts, without the dot.
    fn extension(&self) -> &str {
        "jar"
    }
}

/// Reads `Bundle-SymbolicName` and `Bundle-Version` from a JAR manifest.
///
/// Every other main-section header becomes a descriptive property.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestExtractor;

impl IdentityExtractor for ManifestExtractor {
    fn extract(&self, path: &Path) -> Result<Option<ArtifactMetadata>> {
        let file = File::open(path)
            .with_context(|| format!("failed to open artifact {}", path.display()))?;
        let mut archive = match zip::ZipArchive::new(BufReader::new(file)) {
            Ok(archive) => archive,
            // The file opened fine, so anything here means it is not a usable archive.
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "not a readable archive");
                return Ok(None);
            }
        };

        let mut text = String::new();
        match archive.by_name(MANIFEST_ENTRY) {
            Ok(mut entry) => {
                entry
                    .read_to_string(&mut text)
                    .context("failed to read manifest")?;
            }
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e).context("failed to locate manifest"),
        }

        Ok(metadata_from_headers(parse_manifest(&text)))
    }
}

fn metadata_from_headers(mut headers: BTreeMap<String, String>) -> Option<ArtifactMetadata> {
    let raw_bsn = headers.remove(BUNDLE_SYMBOLIC_NAME)?;
    // Directives such as `;singleton:=true` follow the name.
    let bsn = raw_bsn.split(';').next().unwrap_or_default().trim().to_string();
    if !is_valid_bsn(&bsn) {
        return None;
    }

    let version = match headers.remove(BUNDLE_VERSION) {
        Some(raw) => raw.parse().ok()?,
        None => Version::ZERO,
    };

    Some(ArtifactMetadata {
        identity: ArtifactIdentity::new(bsn, version),
        properties: headers,
    })
}

/// A symbolic name is used as a directory name, so it must be a single
/// plain path segment.
pub fn is_valid_bsn(bsn: &str) -> bool {
    !bsn.is_empty()
        && bsn != "."
        && bsn != ".."
        && !bsn.starts_with('.')
        && bsn
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Parse the main section of a JAR manifest into header/value pairs.
///
/// Continuation lines start with a single space. Parsing stops at the first
/// blank line, which ends the main section.
pub fn parse_manifest(text: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    let mut current: Option<(String, String)> = None;

    for line in text.lines() {
        if line.is_empty() {
            break;
        }
        if let Some(rest) = line.strip_prefix(' ') {
            if let Some((_, value)) = current.as_mut() {
                value.push_str(rest);
            }
            continue;
        }
        if let Some((name, value)) = current.take() {
            headers.insert(name, value);
        }
        if let Some((name, value)) = line.split_once(':') {
            current = Some((name.trim().to_string(), value.trim_start().to_string()));
        }
    }
    if let Some((name, value)) = current {
        headers.insert(name, value);
    }

    headers
}
