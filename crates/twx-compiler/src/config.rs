//! Compiler configuration.

use std::collections::HashMap;
use std::path::PathBuf;

/// Where `process.env.NAME` references are resolved from.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// The environment of the compiler process.
    #[default]
    Process,
    /// A fixed set of variables.
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    pub fn get(&self, name: &str) -> Option<String> {
        match self {
            Self::Process => std::env::var(name).ok(),
            Self::Fixed(vars) => vars.get(name).cloned(),
        }
    }
}

/// Configuration for the entity compiler.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Directory containing entity and mashup source files.
    pub source_dir: PathBuf,

    /// Directory to write entity XML, declarations and debug artefacts.
    pub out_dir: PathBuf,

    /// Project every entity is assigned to.
    pub project_name: String,

    /// Source language (default: "typescript").
    pub language: String,

    /// Instrument service bodies with checkpoints and debugger boilerplate.
    pub debug: bool,

    /// Allow root-level function declarations in model files.
    pub experimental_globals: bool,

    /// Build mashups in Core UI mode (controller classes, class host widget).
    pub core_ui: bool,

    /// Tags applied to every entity.
    pub default_tags: Vec<String>,

    pub environment: EnvSource,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src"),
            out_dir: PathBuf::from("build"),
            project_name: String::new(),
            language: "typescript".to_string(),
            debug: false,
            experimental_globals: false,
            core_ui: false,
            default_tags: Vec::new(),
            environment: EnvSource::Process,
        }
    }
}
