//! Compiler error types.
#![allow(unused_assignments)]

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use super::Span;

/// Errors that can occur during compilation.
///
/// Every structural violation of the accepted source subset aborts the file
/// being compiled; nothing in the compiler recovers from these.
#[allow(unused_assignments)]
#[derive(Error, Diagnostic, Debug)]
pub enum CompilerError {
    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("Failed to read file '{path}': {message}")]
    #[diagnostic(code(twx::io::read_error))]
    IoError {
        path: PathBuf,
        message: String,
    },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("Failed to initialize parser")]
    #[diagnostic(code(twx::parse::init_failed))]
    ParserInitFailed,

    #[error("Failed to parse file: {}", path.display())]
    #[diagnostic(code(twx::parse::parse_failed))]
    ParseFailed {
        path: PathBuf,
    },

    #[error("Syntax error in {}:{line}:{column}: {message}", file.display())]
    #[diagnostic(code(twx::parse::syntax_error))]
    SyntaxError {
        message: String,
        file: PathBuf,
        line: usize,
        column: usize,
    },

    // =========================================================================
    // Source Errors
    // =========================================================================
    #[error("{message}\n  at {}:{line}:{column}\n  {snippet}", file.display())]
    #[diagnostic(
        code(twx::source::invalid_node),
        help("Only the annotated subset of TypeScript understood by the entity compiler may be used here")
    )]
    Node {
        message: String,
        file: PathBuf,
        /// 1-indexed.
        line: usize,
        /// 1-indexed.
        column: usize,
        snippet: String,
    },

    #[error("{message}\n  in {}", file.display())]
    #[diagnostic(code(twx::source::invalid_file))]
    File {
        message: String,
        file: PathBuf,
    },

    // =========================================================================
    // Session Errors
    // =========================================================================
    #[error("Entity '{name}' was not registered before it was referenced")]
    #[diagnostic(
        code(twx::session::unknown_entity),
        help("Make sure the file declaring '{name}' is part of the compiled source directory")
    )]
    UnknownEntity {
        name: String,
    },

    #[error("Duplicate entity class name: {name}")]
    #[diagnostic(code(twx::session::duplicate_entity))]
    DuplicateEntity {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Compilation phase '{attempted}' cannot run while the session is in phase '{current}'")]
    #[diagnostic(code(twx::session::phase_order))]
    PhaseOrder {
        attempted: String,
        current: String,
    },

    // =========================================================================
    // Reverse Errors
    // =========================================================================
    #[error("Invalid entity description: {message}")]
    #[diagnostic(code(twx::reverse::invalid_json))]
    InvalidEntityJson {
        message: String,
    },

    // =========================================================================
    // Frontend Errors
    // =========================================================================
    #[error("Unsupported language: {language}")]
    #[diagnostic(code(twx::frontend::unsupported_language))]
    UnsupportedLanguage {
        language: String,
    },
}

impl CompilerError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::IoError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an error pointing at a source node.
    ///
    /// Synthetic nodes have no position, in which case the error only names
    /// the file.
    pub fn at_node(file: &Path, source: &str, span: Span, message: impl Into<String>) -> Self {
        match span.text(source) {
            Some(snippet) => Self::Node {
                message: message.into(),
                file: file.to_path_buf(),
                line: span.line + 1,
                column: span.column + 1,
                snippet: snippet.lines().next().unwrap_or_default().to_string(),
            },
            None => Self::File {
                message: message.into(),
                file: file.to_path_buf(),
            },
        }
    }

    /// The message without position decoration.
    pub fn message(&self) -> String {
        match self {
            Self::Node { message, .. } | Self::File { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
