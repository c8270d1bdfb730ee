//! ThingWorx entity compiler CLI.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};

use twx_compiler::reverse::{decompile_property, decompile_service};
use twx_compiler::{decompile_entity, CompileResult, Compiler, CompilerConfig, EnvSource};

mod ui;

#[derive(Parser)]
#[command(name = "twx")]
#[command(about = "Compiles annotated TypeScript into ThingWorx entities")]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source directory into entity XML and declarations
    Build {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output directory
        #[arg(short, long, default_value = "build")]
        output: PathBuf,
    },

    /// Compile a source directory without writing anything
    Check {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Convert exported entity JSON back into TypeScript
    Decompile {
        /// JSON file to read
        input: PathBuf,

        /// What the JSON describes
        #[arg(short, long, value_enum, default_value_t = DecompileKind::Entity)]
        kind: DecompileKind,

        /// Write the source here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ProjectArgs {
    /// Source directory
    #[arg(short, long, default_value = "src")]
    source: PathBuf,

    /// Project every entity is assigned to (default: source directory's parent name)
    #[arg(short, long)]
    project: Option<String>,

    /// Source language
    #[arg(short, long, default_value = "typescript")]
    language: String,

    /// Instrument services for the debugger
    #[arg(long)]
    debug: bool,

    /// Allow root-level functions in entity files
    #[arg(long)]
    experimental_globals: bool,

    /// Build mashups for Core UI
    #[arg(long)]
    core_ui: bool,

    /// Tag applied to every entity, repeatable (e.g. Applications:Plant)
    #[arg(short, long = "tag")]
    tags: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DecompileKind {
    Entity,
    Property,
    Service,
}

impl ProjectArgs {
    fn into_config(self, out_dir: PathBuf) -> CompilerConfig {
        let project_name = self.project.unwrap_or_else(|| default_project_name(&self.source));
        CompilerConfig {
            source_dir: self.source,
            out_dir,
            project_name,
            language: self.language,
            debug: self.debug,
            experimental_globals: self.experimental_globals,
            core_ui: self.core_ui,
            default_tags: self.tags,
            environment: EnvSource::Process,
        }
    }
}

/// Name of the directory holding the source directory.
fn default_project_name(source: &Path) -> String {
    std::fs::canonicalize(source)
        .ok()
        .and_then(|path| path.parent().and_then(|p| p.file_name()).map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "twx-project".to_string())
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    ui::init_logger(cli.verbose);

    match cli.command {
        Commands::Build { project, output } => {
            let config = project.into_config(output);
            compile(config, false)?;
        }
        Commands::Check { project } => {
            let config = project.into_config(PathBuf::new());
            compile(config, true)?;
        }
        Commands::Decompile { input, kind, output } => {
            decompile(&input, kind, output.as_deref())?;
        }
    }

    Ok(())
}

fn compile(config: CompilerConfig, check_only: bool) -> miette::Result<()> {
    let start = Instant::now();
    let out_dir = config.out_dir.clone();
    let project_name = config.project_name.clone();
    let compiler = Compiler::new(config);

    let spinner = ui::spinner(if check_only {
        "Checking entities..."
    } else {
        "Compiling entities..."
    });
    let result = if check_only { compiler.check() } else { compiler.compile() };
    spinner.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            ui::failure("Compilation failed");
            return Err(e.into());
        }
    };

    for diagnostic in &result.diagnostics {
        ui::diagnostic(diagnostic);
    }
    summary(&result, &project_name, check_only);
    if !check_only {
        ui::dim(&format!("output written to {}", out_dir.display()));
    }
    ui::timing("Done", start.elapsed().as_millis());

    let (_, errors) = ui::tally(&result.diagnostics);
    if errors > 0 {
        return Err(miette::miette!("{} error(s) reported", errors));
    }
    Ok(())
}

fn summary(result: &CompileResult, project_name: &str, check_only: bool) {
    let (warnings, errors) = ui::tally(&result.diagnostics);
    if errors == 0 {
        ui::success(if check_only { "All entities check out" } else { "Build complete" });
    }
    println!();
    ui::box_header(project_name);
    ui::box_line(&format!(
        "{} entities {} {} files {} {} warnings",
        result.entities,
        ui::symbols::DOT,
        result.files,
        ui::symbols::DOT,
        warnings
    ));
    if !check_only {
        ui::box_line(&format!("{} files written", result.written.len()));
    }
    for endpoint in &result.deployment_endpoints {
        ui::box_line(&format!("{} {}", ui::symbols::BULLET, endpoint));
    }
    ui::box_footer();
    println!();
}

fn decompile(input: &Path, kind: DecompileKind, output: Option<&Path>) -> miette::Result<()> {
    let json = std::fs::read_to_string(input)
        .map_err(|e| miette::miette!("Failed to read {}: {}", input.display(), e))?;
    let source = match kind {
        DecompileKind::Entity => decompile_entity(&json)?,
        DecompileKind::Property => decompile_property(&json)?,
        DecompileKind::Service => decompile_service(&json)?,
    };

    match output {
        Some(path) => {
            std::fs::write(path, &source)
                .map_err(|e| miette::miette!("Failed to write {}: {}", path.display(), e))?;
            ui::success(&format!("Wrote {}", path.display()));
        }
        None => print!("{}", source),
    }
    Ok(())
}
