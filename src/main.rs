//! Command-line driver: `ramlog <program> [flags]`.
//!
//! Parses and evaluates a single Datalog source file to completion. Config
//! file values (`config.toml`/`config.local.toml`/`RAM_*` env vars, see
//! [`ramlog::config`]) are loaded first and then overridden by whichever
//! flags were actually passed.

use clap::Parser;
use ramlog::config::{Config, ProvenanceMode};
use ramlog::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ramlog", about = "Datalog-to-RAM compiler and seminaive interpreter")]
struct Cli {
    /// Path to the Datalog source file to compile and run.
    program: PathBuf,

    /// Directory input fact files are read from (overrides config `io.fact_dir`).
    #[arg(long)]
    fact_dir: Option<PathBuf>,

    /// Directory output/printsize directives write to (overrides config `io.output_dir`).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Worker count for parallel scan partitioning (overrides config `runtime.jobs`, 0 = CPU count).
    #[arg(long)]
    jobs: Option<usize>,

    /// Newline-delimited-JSON profiling events output path.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Raise the log filter from `warn` to `debug`.
    #[arg(long)]
    verbose: bool,

    /// Names of user-defined functor libraries to load (repeatable).
    #[arg(long = "libraries")]
    libraries: Vec<String>,

    /// Search directory for `--libraries` (repeatable).
    #[arg(long = "library-dir")]
    library_dir: Vec<PathBuf>,

    /// Provenance instrumentation mode: none, explain, subtreeHeights, explore.
    #[arg(long)]
    provenance: Option<ProvenanceMode>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(_) => Config::default(),
    };
    if let Some(dir) = cli.fact_dir {
        config.io.fact_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.io.output_dir = dir;
    }
    if let Some(jobs) = cli.jobs {
        config.runtime.jobs = jobs;
    }
    if let Some(path) = cli.profile {
        config.profile.path = Some(path);
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if !cli.libraries.is_empty() {
        config.libraries = cli.libraries;
    }
    if !cli.library_dir.is_empty() {
        config.library_dirs = cli.library_dir;
    }
    if let Some(mode) = cli.provenance {
        config.provenance = mode;
    }

    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match run(&cli.program, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ramlog: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(program_path: &PathBuf, config: &Config) -> Result<(), Error> {
    if matches!(config.provenance, ProvenanceMode::SubtreeHeights | ProvenanceMode::Explore) {
        return Err(Error::Config(format!(
            "provenance mode `{:?}` is accepted but not yet supported by the interpreter",
            config.provenance
        )));
    }

    let source = std::fs::read_to_string(program_path)
        .map_err(|e| Error::Config(format!("failed to read `{}`: {e}", program_path.display())))?;

    let parsed = ramlog::parser::parse(&source).map_err(|e| Error::Parse(e.to_string()))?;

    let mut ast_program = parsed.program;
    ramlog::transform::run(&mut ast_program);

    let ram_program = ramlog::ram::translate::translate(&ast_program, &parsed.directives)?;

    let symbols = ramlog::symbol_table::SymbolTable::new();
    let records = ramlog::record_table::RecordTable::new();

    ramlog::interpreter::run(&ram_program, &ast_program, config, &symbols, &records)
}
