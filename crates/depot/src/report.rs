//! Diagnostics gathered while a repository operation runs.
//!
//! A [`Report`] is returned next to the primary result instead of being held
//! as shared state. Warnings mean the repository is degraded but usable;
//! errors mean part of the operation (typically index generation) failed even
//! though the call itself returned `Ok`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// No generator is registered for the configured index type.
    GeneratorNotFound,
    /// The configured generator does not produce indexes.
    GeneratorNonGenerating,
    /// The generator ran and failed; the previous index was kept.
    GeneratorFailed,
    /// A file under the repository root could not be described for the index.
    UnindexableArtifact,
    /// The artifact listing itself failed, so no index could be built.
    ScanFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}: {}", self.message)
    }
}

/// Append-only collection of diagnostics for one logical operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warning(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(?kind, "{}", message);
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            kind,
            message,
        });
    }

    pub fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(?kind, "{}", message);
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            kind,
            message,
        });
    }

    /// Move every diagnostic from `other` into this report, keeping order.
    pub fn absorb(&mut self, other: Report) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_kind(&self, kind: DiagnosticKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }

    /// True when nothing at all was recorded.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// A result value together with the diagnostics produced while computing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reported<T> {
    pub value: T,
    pub report: Report,
}

impl<T> Reported<T> {
    pub fn new(value: T, report: Report) -> Self {
        Self { value, report }
    }

    pub fn clean(value: T) -> Self {
        Self::new(value, Report::default())
    }

    pub fn into_parts(self) -> (T, Report) {
        (self.value, self.report)
    }
}
