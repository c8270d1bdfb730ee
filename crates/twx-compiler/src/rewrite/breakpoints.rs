//! Debug breakpoint locations recorded while instrumenting bodies.

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::diagnostic::Span;

/// A checkpoint location. Lines and columns are 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    pub id: String,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileBreakpoints {
    pub file: String,
    pub breakpoints: Vec<Breakpoint>,
    #[serde(skip)]
    stem: String,
    #[serde(skip)]
    next_id: usize,
}

impl FileBreakpoints {
    pub fn new(file: &Path, stem: impl Into<String>) -> Self {
        Self {
            file: file.display().to_string(),
            breakpoints: Vec::new(),
            stem: stem.into(),
            next_id: 1,
        }
    }

    /// Returns the checkpoint id for `span`, reusing the id of an existing
    /// breakpoint at the same line and column.
    pub fn record(&mut self, span: Span) -> String {
        let (line, column) = (span.line + 1, span.column + 1);
        if let Some(existing) = self
            .breakpoints
            .iter()
            .find(|b| b.line == line && b.column == column)
        {
            return existing.id.clone();
        }
        let id = format!("{}-{}", self.stem, self.next_id);
        self.next_id += 1;
        self.breakpoints.push(Breakpoint {
            id: id.clone(),
            line,
            column,
            end_line: span.end_line + 1,
            end_column: span.end_column + 1,
        });
        id
    }
}

/// Breakpoints of every instrumented file, in the order files were first seen.
#[derive(Debug, Default)]
pub struct Breakpoints {
    files: IndexMap<String, FileBreakpoints>,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_mut(&mut self, path: &Path, stem: &str) -> &mut FileBreakpoints {
        self.files
            .entry(path.display().to_string())
            .or_insert_with(|| FileBreakpoints::new(path, stem))
    }

    pub fn is_empty(&self) -> bool {
        self.files.values().all(|f| f.breakpoints.is_empty())
    }

    pub fn into_vec(self) -> Vec<FileBreakpoints> {
        self.files
            .into_values()
            .filter(|f| !f.breakpoints.is_empty())
            .collect()
    }
}
