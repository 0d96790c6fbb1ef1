//! Indexed local artifact repository.
//!
//! Stores versioned component archives under a root directory as
//! `{bsn}/{bsn}-{version}.jar` and keeps a machine-readable index of them,
//! rebuilt after every successful put by a pluggable index generator.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use depot::{LocalIndexedRepo, PutOptions, RepoConfig, RepositoryPlugin};
//!
//! let repo = LocalIndexedRepo::new(RepoConfig::with_root("/srv/depot"));
//!
//! // Store a bundle; index problems land in the report, not in the error
//! let mut jar = std::fs::File::open("org.example.api-1.0.0.jar").unwrap();
//! let reported = repo.put(&mut jar, &PutOptions::default().generate_digest()).unwrap();
//! for diagnostic in reported.report.diagnostics() {
//!     eprintln!("{diagnostic}");
//! }
//!
//! // Resolve the highest version through the index
//! if let Some(path) = repo.get("org.example.api", None, &BTreeMap::new()).unwrap() {
//!     println!("File at: {}", path.display());
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `DEPOT_LOCAL`: Repository root (default: `~/.depot/repository`)
//! - `DEPOT_TYPE`: Index generator type (default: `json`)
//! - `DEPOT_OVERWRITE`: Set to "false" to keep existing artifacts
//! - `DEPOT_READONLY`: Set to "true" for read-only mode
//!
//! # Concurrency
//!
//! Puts and reindexing take an advisory lock on `{root}/.lock`, so two
//! processes writing the same root serialize. Readers never lock; an index is
//! always replaced by rename, so they see either the old or the new file.

pub mod config;
pub mod digest;
pub mod error;
pub mod fixed;
pub mod identity;
pub mod index;
pub mod local;
pub mod lock;
pub mod report;
pub mod repository;
pub mod staging;
pub mod store;
pub mod version;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use config::{ConflictPolicy, FixedConfig, RepoConfig};
pub use digest::{Digest, DigestError};
pub use error::{RepoError, RepoResult};
pub use fixed::FixedIndexedRepo;
pub use identity::{ArtifactIdentity, ArtifactMetadata, IdentityExtractor, ManifestExtractor};
pub use index::{GeneratorContext, GeneratorRegistry, IndexGenerator, IndexOutcome, JsonIndexGenerator};
pub use local::LocalIndexedRepo;
pub use report::{Diagnostic, DiagnosticKind, Report, Reported, Severity};
pub use repository::{PutOptions, PutResult, RepositoryPlugin, ResolveStrategy};
pub use store::{ArtifactTransform, ArtifactStore, StoreOutcome};
pub use version::{Version, VersionError};
