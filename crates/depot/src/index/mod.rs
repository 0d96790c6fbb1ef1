//! Index generation, the standard index document, and the parsed view that
//! read operations consult.

pub mod document;
pub mod generator;
pub mod json;
pub mod snapshot;

pub use document::{ArtifactRecord, IndexDocument};
pub use generator::{regenerate_index, GeneratorContext, GeneratorRegistry, IndexGenerator, IndexOutcome};
pub use json::JsonIndexGenerator;
pub use snapshot::{IndexSnapshot, ResolvedArtifact, SnapshotCache};
