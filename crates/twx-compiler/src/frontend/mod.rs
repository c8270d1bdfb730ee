//! Language frontends for parsing source code into the typed AST.
//!
//! The transformers only depend on [`typescript::ast`]; a frontend is
//! responsible for turning source text of its language into that shape.

pub mod typescript;

use std::path::Path;

use crate::diagnostic::CompilerError;
use typescript::ast::ParsedFile;

/// Trait for language frontends.
pub trait Frontend {
    /// Returns the language name (e.g., "typescript").
    fn language(&self) -> &str;

    /// Returns file extensions this frontend handles (e.g., ["ts", "tsx"]).
    fn extensions(&self) -> &[&str];

    /// Parses one source file.
    fn parse_source(&mut self, source: &str, path: &Path) -> Result<ParsedFile, CompilerError>;

    /// Returns true when `path` is a source file of this language.
    fn accepts(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        if name.ends_with(".d.ts") {
            return false;
        }
        path.extension()
            .map(|ext| self.extensions().contains(&ext.to_string_lossy().as_ref()))
            .unwrap_or(false)
    }
}

/// Creates a frontend for the given language.
pub fn create_frontend(language: &str) -> Result<Box<dyn Frontend>, CompilerError> {
    match language {
        "typescript" | "ts" => Ok(Box::new(typescript::TypeScriptFrontend::new()?)),
        _ => Err(CompilerError::UnsupportedLanguage {
            language: language.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_sources_but_not_declarations() {
        let frontend = create_frontend("typescript").unwrap();
        assert!(frontend.accepts(Path::new("things/Pump.ts")));
        assert!(frontend.accepts(Path::new("mashups/Overview.tsx")));
        assert!(!frontend.accepts(Path::new("@types/Pump.d.ts")));
        assert!(!frontend.accepts(Path::new("notes.md")));
    }

    #[test]
    fn test_unknown_language() {
        assert!(matches!(
            create_frontend("python"),
            Err(CompilerError::UnsupportedLanguage { language }) if language == "python"
        ));
    }
}
