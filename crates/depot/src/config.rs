//! Repository configuration with environment, TOML file, and property loading.
//!
//! Environment variables:
//! - `DEPOT_LOCAL`: Root directory of the local repository
//! - `DEPOT_TYPE`: Index generator type (default `json`)
//! - `DEPOT_OVERWRITE`: Set to "false" to keep existing artifacts
//! - `DEPOT_READONLY`: Set to "true" for read-only mode
//!
//! Default root: `~/.depot/repository`

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::index::json::JSON_INDEX_TYPE;

/// What to do when overwrite is disabled and an artifact with the same
/// identity but different bytes is put.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Keep the existing file and report "not stored".
    #[default]
    Skip,
    /// Fail the put with `ArtifactExists`.
    Fail,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            other => bail!("unknown conflict policy {other:?} (expected skip or fail)"),
        }
    }
}

/// Configuration for a [`LocalIndexedRepo`](crate::local::LocalIndexedRepo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Display name; defaults to the root path.
    #[serde(default)]
    pub name: Option<String>,

    /// Root directory holding `<bsn>/<bsn>-<version>.<ext>` and the index.
    pub local: PathBuf,

    /// Key of the index generator to use.
    #[serde(rename = "type", default = "default_index_type")]
    pub index_type: String,

    /// Replace an existing artifact with the same identity.
    #[serde(default = "default_true")]
    pub overwrite: bool,

    /// Applies only when `overwrite` is false and the bytes differ.
    #[serde(default)]
    pub on_conflict: ConflictPolicy,

    /// Read-only mode - prevents any writes.
    #[serde(default)]
    pub read_only: bool,

    /// Passed through to the index generator untouched (e.g. `pretty`).
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_index_type() -> String {
    JSON_INDEX_TYPE.to_string()
}

/// Get the default repository root (~/.depot/repository).
fn default_root() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".depot").join("repository"))
        .unwrap_or_else(|| PathBuf::from(".depot/repository"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => bail!("invalid boolean {other:?} for {key}"),
    }
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self::with_root(default_root())
    }
}

impl RepoConfig {
    /// Create a writable config rooted at `path` using the default generator.
    pub fn with_root(path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            local: path.into(),
            index_type: default_index_type(),
            overwrite: true,
            on_conflict: ConflictPolicy::Skip,
            read_only: false,
            options: BTreeMap::new(),
        }
    }

    /// Create a read-only config rooted at `path`.
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            read_only: true,
            ..Self::with_root(path)
        }
    }

    pub fn index_type(mut self, index_type: impl Into<String>) -> Self {
        self.index_type = index_type.into();
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn on_conflict(mut self, policy: ConflictPolicy) -> Self {
        self.on_conflict = policy;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::with_root(
            env::var("DEPOT_LOCAL")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_root()),
        );

        if let Ok(index_type) = env::var("DEPOT_TYPE") {
            config.index_type = index_type;
        }
        if let Ok(value) = env::var("DEPOT_OVERWRITE") {
            config.overwrite = parse_flag("DEPOT_OVERWRITE", &value)?;
        }
        if let Ok(value) = env::var("DEPOT_READONLY") {
            config.read_only = parse_flag("DEPOT_READONLY", &value)?;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to environment.
    ///
    /// The file should contain a `[repository]` section:
    /// ```toml
    /// [repository]
    /// local = "/srv/depot"
    /// type = "json"
    /// overwrite = false
    /// on_conflict = "fail"
    ///
    /// [repository.options]
    /// pretty = "true"
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let table: toml::Table = contents
            .parse()
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;

        if let Some(section) = table.get("repository") {
            let config: RepoConfig = section
                .clone()
                .try_into()
                .context("failed to parse [repository] section")?;
            Ok(config)
        } else {
            Self::from_env()
        }
    }

    /// Build from the flat string properties a build tool hands a repository
    /// plugin: `local`, `type`, `overwrite`, `name`, `readonly`, `onconflict`.
    ///
    /// Any other key is passed through to the generator.
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Result<Self> {
        let local = properties
            .get("local")
            .context("missing required property 'local'")?;
        let mut config = Self::with_root(local);

        for (key, value) in properties {
            match key.as_str() {
                "local" => {}
                "type" => config.index_type = value.trim().to_string(),
                "name" => config.name = Some(value.clone()),
                "overwrite" => config.overwrite = parse_flag(key, value)?,
                "readonly" => config.read_only = parse_flag(key, value)?,
                "onconflict" => config.on_conflict = value.parse()?,
                _ => {
                    config.options.insert(key.clone(), value.clone());
                }
            }
        }

        if config.index_type.is_empty() {
            bail!("property 'type' must not be empty");
        }

        Ok(config)
    }

    /// Name shown to users: the configured name, else the root path.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.local.display().to_string())
    }
}

/// Configuration for a [`FixedIndexedRepo`](crate::fixed::FixedIndexedRepo).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedConfig {
    #[serde(default)]
    pub name: Option<String>,

    /// Index locations: plain paths or `file:` URLs.
    pub locations: Vec<String>,
}

impl FixedConfig {
    pub fn with_location(location: impl Into<String>) -> Self {
        Self {
            name: None,
            locations: vec![location.into()],
        }
    }

    /// Reads `name` and the comma-separated `locations` property.
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Result<Self> {
        let locations: Vec<String> = properties
            .get("locations")
            .context("missing required property 'locations'")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            name: properties.get("name").cloned(),
            locations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = RepoConfig::default();
        assert!(config.local.to_string_lossy().contains(".depot"));
        assert_eq!(config.index_type, "json");
        assert!(config.overwrite);
        assert!(!config.read_only);
        assert_eq!(config.on_conflict, ConflictPolicy::Skip);
    }

    #[test]
    fn test_read_only_config() {
        let config = RepoConfig::read_only("/srv/depot");
        assert_eq!(config.local, PathBuf::from("/srv/depot"));
        assert!(config.read_only);
    }

    #[test]
    fn test_from_properties() {
        let config = RepoConfig::from_properties(&props(&[
            ("local", "/tmp/out"),
            ("type", "R5"),
            ("overwrite", "false"),
            ("onconflict", "fail"),
            ("pretty", "true"),
        ]))
        .unwrap();

        assert_eq!(config.local, PathBuf::from("/tmp/out"));
        assert_eq!(config.index_type, "R5");
        assert!(!config.overwrite);
        assert_eq!(config.on_conflict, ConflictPolicy::Fail);
        assert_eq!(config.options.get("pretty").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_from_properties_requires_local() {
        let err = RepoConfig::from_properties(&props(&[("type", "json")])).unwrap_err();
        assert!(err.to_string().contains("local"));
    }

    #[test]
    fn test_from_properties_rejects_bad_flag() {
        let result =
            RepoConfig::from_properties(&props(&[("local", "/x"), ("overwrite", "perhaps")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file_reads_section() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("depot.toml");
        std::fs::write(
            &path,
            r#"
[repository]
name = "releases"
local = "/srv/releases"
overwrite = false

[repository.options]
pretty = "true"
"#,
        )?;

        let config = RepoConfig::from_file(&path)?;
        assert_eq!(config.name.as_deref(), Some("releases"));
        assert_eq!(config.local, PathBuf::from("/srv/releases"));
        assert_eq!(config.index_type, "json");
        assert!(!config.overwrite);
        assert_eq!(config.options.get("pretty").map(String::as_str), Some("true"));
        Ok(())
    }

    #[test]
    fn test_display_name_falls_back_to_root() {
        let config = RepoConfig::with_root("/srv/depot");
        assert_eq!(config.display_name(), "/srv/depot");
    }

    #[test]
    fn test_fixed_from_properties() {
        let config = FixedConfig::from_properties(&props(&[(
            "locations",
            "file:///a/index.json.gz, /b/index.json ,",
        )]))
        .unwrap();
        assert_eq!(
            config.locations,
            vec!["file:///a/index.json.gz".to_string(), "/b/index.json".to_string()]
        );
    }
}
