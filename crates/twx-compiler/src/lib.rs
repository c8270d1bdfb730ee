//! # ThingWorx Entity Compiler
//!
//! This crate compiles annotated TypeScript classes into ThingWorx entity
//! XML. Each source file declares one Thing, ThingTemplate, ThingShape,
//! DataShape, UserList, Organization or Mashup, or contains global code
//! attached to a Thing.
//!
//! ## Architecture
//!
//! ```text
//! Source Code (.ts / .tsx)
//!        │
//!        ▼
//! ┌──────────────┐
//! │   Frontend   │  tree-sitter parsing into a typed AST
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │  Transform   │  Structural pass: one entity descriptor per file
//! └──────┬───────┘
//!        │   (phase barrier: every entity known)
//!        ▼
//! ┌──────────────┐
//! │ Rewrite / UI │  Method bodies to runtime script, mashups
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │     XML      │  Entity documents and declarations
//! └──────────────┘
//! ```
//!
//! The [`reverse`] module goes the other way, from entity JSON back to
//! TypeScript.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use twx_compiler::{Compiler, CompilerConfig};
//!
//! let config = CompilerConfig {
//!     source_dir: "src".into(),
//!     out_dir: "build".into(),
//!     project_name: "Plant".to_string(),
//!     ..CompilerConfig::default()
//! };
//!
//! let result = Compiler::new(config).compile()?;
//! println!("{} entities", result.entities);
//! ```

pub mod config;
pub mod diagnostic;
pub mod frontend;
pub mod model;
pub mod resolve;
pub mod reverse;
pub mod rewrite;
pub mod session;
pub mod transform;
pub mod ui;
pub mod xml;

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub use config::{CompilerConfig, EnvSource};
pub use diagnostic::{CompilerError, Diagnostic, DiagnosticKind};
pub use reverse::decompile_entity;
pub use session::{CompileOutput, EntityArtifact, Session};

/// Directory under the output directory receiving entity XML.
const ENTITIES_DIR: &str = "Entities";
/// Directory under the output directory receiving declarations.
const TYPES_DIR: &str = "@types";
const BREAKPOINTS_FILE: &str = "breakpoints.json";

/// Compiles a source directory into an output directory.
pub struct Compiler {
    config: CompilerConfig,
}

/// Summary of a compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileResult {
    pub entities: usize,
    pub files: usize,
    pub written: Vec<PathBuf>,
    pub deployment_endpoints: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles every source file and writes the results.
    ///
    /// Writes `Entities/<Collection>/<Name>.xml` and `@types/<Name>.d.ts` for
    /// every entity, and `breakpoints.json` in debug builds.
    pub fn compile(&self) -> Result<CompileResult, CompilerError> {
        let (files, output) = self.run_session()?;
        let written = self.write_output(&output)?;
        log::info!("compiled {} entities from {} files", output.artifacts.len(), files);
        Ok(CompileResult {
            entities: output.artifacts.len(),
            files,
            written,
            deployment_endpoints: output.deployment_endpoints,
            diagnostics: output.diagnostics,
        })
    }

    /// Compiles every source file without writing anything.
    pub fn check(&self) -> Result<CompileResult, CompilerError> {
        let (files, output) = self.run_session()?;
        Ok(CompileResult {
            entities: output.artifacts.len(),
            files,
            written: Vec::new(),
            deployment_endpoints: output.deployment_endpoints,
            diagnostics: output.diagnostics,
        })
    }

    fn run_session(&self) -> Result<(usize, CompileOutput), CompilerError> {
        let mut session = Session::new(self.config.clone())?;
        let sources = self.source_files(&session)?;
        for path in &sources {
            let text = std::fs::read_to_string(path).map_err(|e| CompilerError::io(path, e.to_string()))?;
            let relative = pathdiff::diff_paths(path, &self.config.source_dir).unwrap_or_else(|| path.clone());
            session.add_source(relative, &text)?;
        }
        Ok((sources.len(), session.run()?))
    }

    /// Source files under the source directory, sorted for a stable order.
    fn source_files(&self, session: &Session) -> Result<Vec<PathBuf>, CompilerError> {
        let dir = &self.config.source_dir;
        if !dir.is_dir() {
            return Err(CompilerError::io(dir, "source directory does not exist"));
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| CompilerError::io(dir, e.to_string()))?;
            if entry.file_type().is_file() && session.accepts(entry.path()) {
                files.push(entry.into_path());
            }
        }
        log::debug!("found {} source files in {}", files.len(), dir.display());
        Ok(files)
    }

    fn write_output(&self, output: &CompileOutput) -> Result<Vec<PathBuf>, CompilerError> {
        let mut written = Vec::new();
        for artifact in &output.artifacts {
            let xml_path = self
                .config
                .out_dir
                .join(ENTITIES_DIR)
                .join(artifact.kind.collection())
                .join(format!("{}.xml", artifact.name));
            write_file(&xml_path, &artifact.xml)?;
            written.push(xml_path);

            if !artifact.declaration.is_empty() {
                let declaration_path = self.config.out_dir.join(TYPES_DIR).join(format!("{}.d.ts", artifact.name));
                write_file(&declaration_path, &artifact.declaration)?;
                written.push(declaration_path);
            }
        }
        if !output.breakpoints.is_empty() {
            let path = self.config.out_dir.join(BREAKPOINTS_FILE);
            let json = serde_json::to_string_pretty(&output.breakpoints)
                .map_err(|e| CompilerError::io(&path, e.to_string()))?;
            write_file(&path, &json)?;
            written.push(path);
        }
        Ok(written)
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), CompilerError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CompilerError::io(parent, e.to_string()))?;
    }
    std::fs::write(path, content).map_err(|e| CompilerError::io(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> (TempDir, CompilerConfig) {
        let dir = TempDir::new().unwrap();
        let source_dir = dir.path().join("src");
        for (name, text) in files {
            let path = source_dir.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, text).unwrap();
        }
        let config = CompilerConfig {
            source_dir,
            out_dir: dir.path().join("build"),
            project_name: "Plant".to_string(),
            ..CompilerConfig::default()
        };
        (dir, config)
    }

    const PUMP: &str = r#"
@ThingDefinition
class Pump extends GenericThing {
    @persistent speed: NUMBER = 1;

    start(): NOTHING {
        this.speed = 2;
    }
}
"#;

    #[test]
    fn test_compile_writes_entities_and_declarations() {
        let (_dir, config) = project(&[
            ("things/Pump.ts", PUMP),
            ("shapes/Row.ts", "class Row extends DataShapeBase { id: STRING; }"),
            ("globals.d.ts", "declare const ignored: number;"),
        ]);
        let out_dir = config.out_dir.clone();
        let result = Compiler::new(config).compile().unwrap();
        assert_eq!(result.files, 2);
        assert_eq!(result.entities, 2);

        let xml = std::fs::read_to_string(out_dir.join("Entities/Things/Pump.xml")).unwrap();
        assert!(xml.contains("<Things>"));
        assert!(xml.contains("projectName=\"Plant\""));
        assert!(out_dir.join("Entities/DataShapes/Row.xml").exists());
        let declaration = std::fs::read_to_string(out_dir.join("@types/Pump.d.ts")).unwrap();
        assert!(declaration.contains("declare interface Things"));
        assert!(!out_dir.join("breakpoints.json").exists());
    }

    #[test]
    fn test_debug_build_writes_breakpoints() {
        let (_dir, mut config) = project(&[("Pump.ts", PUMP)]);
        config.debug = true;
        let out_dir = config.out_dir.clone();
        Compiler::new(config).compile().unwrap();
        let json = std::fs::read_to_string(out_dir.join("breakpoints.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["breakpoints"][0]["id"], "Pump-1");
    }

    #[test]
    fn test_check_writes_nothing() {
        let (_dir, config) = project(&[("Pump.ts", PUMP)]);
        let out_dir = config.out_dir.clone();
        let result = Compiler::new(config).check().unwrap();
        assert_eq!(result.entities, 1);
        assert!(!out_dir.exists());
    }

    #[test]
    fn test_errors_stop_the_build() {
        let (_dir, config) = project(&[("Pump.ts", "class Pump extends GenericThing {}")]);
        let out_dir = config.out_dir.clone();
        assert!(Compiler::new(config).compile().is_err());
        assert!(!out_dir.exists());
    }

    #[test]
    fn test_missing_source_dir() {
        let config = CompilerConfig {
            source_dir: PathBuf::from("/nonexistent/twx/src"),
            ..CompilerConfig::default()
        };
        assert!(matches!(Compiler::new(config).check(), Err(CompilerError::IoError { .. })));
    }
}
