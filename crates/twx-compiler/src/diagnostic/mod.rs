//! Diagnostic types for error reporting.

mod error;
mod span;

pub use error::CompilerError;
pub use span::Span;

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Severity of a non-fatal diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    Warning,
    Error,
}

/// A non-fatal message recorded while compiling a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub file: PathBuf,
    /// 1-indexed, 0 when the position is unknown.
    pub line: usize,
    pub column: usize,
}

/// An append-only list of diagnostics.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warning(&mut self, file: &Path, span: Span, message: impl Into<String>) {
        self.push(DiagnosticKind::Warning, file, span, message.into());
    }

    pub fn error(&mut self, file: &Path, span: Span, message: impl Into<String>) {
        self.push(DiagnosticKind::Error, file, span, message.into());
    }

    fn push(&mut self, kind: DiagnosticKind, file: &Path, span: Span, message: String) {
        let (line, column) = if span.is_synthetic() {
            (0, 0)
        } else {
            (span.line + 1, span.column + 1)
        };
        if kind == DiagnosticKind::Warning {
            log::warn!("{}:{}:{}: {}", file.display(), line, column, message);
        }
        self.entries.push(Diagnostic {
            kind,
            message,
            file: file.to_path_buf(),
            line,
            column,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
