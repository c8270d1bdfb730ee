//! TypeScript frontend for the entity compiler.

pub mod ast;
pub mod jsdoc;
pub mod parser;

use std::path::Path;

use super::Frontend;
use crate::diagnostic::CompilerError;
use ast::ParsedFile;
use parser::TypeScriptParser;

/// Parses `.ts` and `.tsx` files; the grammar is picked per file.
pub struct TypeScriptFrontend {
    parser: TypeScriptParser,
}

impl TypeScriptFrontend {
    pub fn new() -> Result<Self, CompilerError> {
        Ok(Self {
            parser: TypeScriptParser::new()?,
        })
    }
}

impl Frontend for TypeScriptFrontend {
    fn language(&self) -> &str {
        "typescript"
    }

    fn extensions(&self) -> &[&str] {
        &["ts", "tsx"]
    }

    fn parse_source(&mut self, source: &str, path: &Path) -> Result<ParsedFile, CompilerError> {
        log::debug!("parsing {}", path.display());
        self.parser.parse(source, path)
    }
}
