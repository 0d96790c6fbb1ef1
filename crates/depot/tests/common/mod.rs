//! Common test utilities for depot integration tests
//!
//! Builds small bundle archives in memory and opens repositories in
//! temporary directories.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::PathBuf;

use anyhow::Result;
use depot::{GeneratorRegistry, LocalIndexedRepo, RepoConfig};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// A bundle archive under construction.
pub struct BundleBuilder {
    headers: Vec<(String, String)>,
    entries: Vec<(String, Vec<u8>)>,
}

impl BundleBuilder {
    pub fn new(bsn: &str, version: &str) -> Self {
        Self {
            headers: vec![
                ("Manifest-Version".into(), "1.0".into()),
                ("Bundle-ManifestVersion".into(), "2".into()),
                ("Bundle-SymbolicName".into(), bsn.into()),
                ("Bundle-Version".into(), version.into()),
            ],
            entries: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn entry(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push((name.into(), data.to_vec()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut manifest = String::new();
        for (name, value) in &self.headers {
            manifest.push_str(&format!("{name}: {value}\r\n"));
        }
        manifest.push_str("\r\n");

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("META-INF/MANIFEST.MF", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(manifest.as_bytes()).unwrap();
        for (name, data) in &self.entries {
            writer.start_file(name.as_str(), SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}

pub fn bundle(bsn: &str, version: &str) -> Vec<u8> {
    BundleBuilder::new(bsn, version).build()
}

/// A local repository in a temporary directory that lives as long as it does.
pub struct TestRepo {
    pub repo: LocalIndexedRepo,
    pub dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        Self::with_config(|config| config)
    }

    pub fn with_config(f: impl FnOnce(RepoConfig) -> RepoConfig) -> Result<Self> {
        Self::with_registry(f, GeneratorRegistry::with_defaults())
    }

    pub fn with_registry(
        f: impl FnOnce(RepoConfig) -> RepoConfig,
        registry: GeneratorRegistry,
    ) -> Result<Self> {
        let dir = TempDir::new()?;
        let config = f(RepoConfig::with_root(dir.path()));
        Ok(Self {
            repo: LocalIndexedRepo::with_registry(config, registry),
            dir,
        })
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .fold(self.dir.path().to_path_buf(), |path, segment| path.join(segment))
    }
}

pub fn no_props() -> BTreeMap<String, String> {
    BTreeMap::new()
}
