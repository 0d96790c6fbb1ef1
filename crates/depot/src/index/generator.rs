//! Pluggable index generators and the dispatch that runs them.
//!
//! Generators are looked up by a string type key in a [`GeneratorRegistry`]
//! that is filled in explicitly when the repository is built. Dispatch always
//! hands the generator the full artifact set; there is no incremental update.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use super::document::{read_document, ArtifactRecord, IndexDocument};
use super::json::JsonIndexGenerator;
use crate::report::{DiagnosticKind, Report};
use crate::staging::StagedFile;

/// Everything a generator gets to see besides the artifacts.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorContext<'a> {
    pub root: &'a Path,
    pub name: Option<&'a str>,
    pub options: &'a BTreeMap<String, String>,
}

/// Produces an index artifact from the complete set of stored artifacts.
pub trait IndexGenerator: Send + Sync {
    /// Registry key, e.g. `json`.
    fn index_type(&self) -> &str;

    /// Passthrough providers answer false and are never asked to generate.
    fn is_generating(&self) -> bool {
        true
    }

    /// Name of the index file under the repository root.
    fn file_name(&self, options: &BTreeMap<String, String>) -> String;

    /// Write the index for `artifacts` to `out`.
    fn generate(
        &self,
        artifacts: &[ArtifactRecord],
        ctx: &GeneratorContext<'_>,
        out: &mut dyn Write,
    ) -> Result<()>;

    /// Parse an index this generator wrote.
    ///
    /// Generators that emit the standard document can keep the default.
    fn read(&self, input: &mut dyn Read) -> Result<IndexDocument> {
        read_document(input)
    }
}

/// Generators available to a repository, keyed by type.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn IndexGenerator>>,
}

impl GeneratorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in generators.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JsonIndexGenerator));
        registry
    }

    /// Add a generator, replacing any previous one with the same type.
    pub fn register(&mut self, generator: Arc<dyn IndexGenerator>) -> &mut Self {
        let key = generator.index_type().to_string();
        if self.generators.insert(key.clone(), generator).is_some() {
            tracing::debug!(index_type = %key, "replaced registered index generator");
        }
        self
    }

    pub fn select(&self, index_type: &str) -> Option<Arc<dyn IndexGenerator>> {
        self.generators.get(index_type).cloned()
    }

    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.generators.keys().cloned().collect();
        types.sort();
        types
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("types", &self.types())
            .finish()
    }
}

/// How a regeneration attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The index at this path was replaced.
    Replaced(PathBuf),
    /// The previous index (if any) was left untouched.
    Unchanged,
}

/// Rebuild the index at `root` with the generator registered as `index_type`.
///
/// Never fails: a missing or passthrough generator is a warning, a failing
/// generator is an error, and in every such case the previous index file is
/// left exactly as it was.
pub fn regenerate_index(
    registry: &GeneratorRegistry,
    index_type: &str,
    artifacts: &[ArtifactRecord],
    ctx: &GeneratorContext<'_>,
) -> (IndexOutcome, Report) {
    let mut report = Report::new();

    let Some(generator) = registry.select(index_type) else {
        report.warning(
            DiagnosticKind::GeneratorNotFound,
            format!("no content provider for type {index_type}; index not regenerated"),
        );
        return (IndexOutcome::Unchanged, report);
    };

    if !generator.is_generating() {
        report.warning(
            DiagnosticKind::GeneratorNonGenerating,
            format!("content provider for type {index_type} does not generate indexes; index not regenerated"),
        );
        return (IndexOutcome::Unchanged, report);
    }

    let target = ctx.root.join(generator.file_name(ctx.options));
    match write_index(generator.as_ref(), artifacts, ctx, &target) {
        Ok(()) => {
            tracing::info!(
                index = %target.display(),
                index_type,
                artifacts = artifacts.len(),
                "regenerated index"
            );
            (IndexOutcome::Replaced(target), report)
        }
        Err(e) => {
            report.error(
                DiagnosticKind::GeneratorFailed,
                format!("content provider for type {index_type} failed to generate index: {e:#}"),
            );
            (IndexOutcome::Unchanged, report)
        }
    }
}

fn write_index(
    generator: &dyn IndexGenerator,
    artifacts: &[ArtifactRecord],
    ctx: &GeneratorContext<'_>,
    target: &Path,
) -> Result<()> {
    let (staged, file) = StagedFile::create(ctx.root).context("failed to stage index")?;
    let mut out = std::io::BufWriter::new(file);
    generator.generate(artifacts, ctx, &mut out)?;
    let file = out
        .into_inner()
        .map_err(|e| e.into_error())
        .context("failed to flush index")?;
    file.sync_all().context("failed to sync index")?;
    drop(file);

    staged
        .persist(target)
        .with_context(|| format!("failed to move index into place at {}", target.display()))
}
