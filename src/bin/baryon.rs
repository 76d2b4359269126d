//! Baryon CLI - Command-line interface for the bala compiler
//!
//! Provides subcommands for compiling bala programs, checking their
//! syntax and importing Galaxy tool descriptors.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use baryon::config::{CONFIG_FILE, CompilerConfig};
use baryon::importer::galaxy;
use baryon::transpiler::Registry;
use baryon::util::{read_to_string, write_atomic};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "baryon", version)]
#[command(about = "Compile bala workflow programs to Bash, Python, R, Nextflow and Galaxy", long_about = None)]
struct Cli {
    /// Configuration file (default: ./baryon.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a bala program
    Build {
        /// Input bala file
        input: PathBuf,

        /// Target language (see `baryon languages`)
        #[arg(short, long)]
        lang: Option<String>,

        /// Output file (default: input name with the target's extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check syntax only and print the parsed program
    Check {
        /// Input bala file
        input: PathBuf,

        /// Print the program as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a Galaxy tool XML file to bala
    Import {
        /// Galaxy tool XML file
        input: PathBuf,

        /// Output file (default: input name with a .bala extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the supported target languages
    Languages,
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let registry = Registry::builtin();

    match cli.command {
        Commands::Build {
            input,
            lang,
            output,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let language = lang.unwrap_or_else(|| config.default_language.clone());
            let descriptor = registry.get(&language)?;
            let output =
                output.unwrap_or_else(|| config.output_path(&input, descriptor.extension));

            println!("Reading: {}", input.display());
            let source = read_to_string(&input)?;

            println!("Parsing bala code...");
            let program = baryon::parse_program(&source).context("parsing error")?;

            println!("Transpiling to {}...", descriptor.display);
            let code = descriptor
                .create()
                .transpile(&program)
                .context("transpilation failed")?;

            println!("Writing: {}", output.display());
            write_atomic(&output, code.as_bytes()).context("writing output")?;
            println!("Transpilation completed successfully");
        }

        Commands::Check { input, json } => {
            let source = read_to_string(&input)?;
            let program = baryon::parse_program(&source).context("parsing error")?;
            if json {
                let text = serde_json::to_string_pretty(&program)
                    .context("Failed to serialize program")?;
                println!("{text}");
            } else {
                println!("Syntax check passed");
                print!("{program}");
            }
        }

        Commands::Import { input, output } => {
            let xml = read_to_string(&input)?;
            let source = galaxy::import(&xml)
                .with_context(|| format!("importing {}", input.display()))?;
            let output = output.unwrap_or_else(|| input.with_extension("bala"));

            write_atomic(&output, source.as_bytes()).context("writing output")?;
            println!("Imported {} into {}", input.display(), output.display());
        }

        Commands::Languages => {
            for descriptor in registry.descriptors() {
                println!(
                    "{:<10} {:<10} .{}",
                    descriptor.name, descriptor.display, descriptor.extension
                );
            }
        }
    }

    Ok(())
}

/// An explicit `--config` must exist; otherwise `baryon.json` is optional.
fn load_config(path: Option<&Path>) -> Result<CompilerConfig> {
    match path {
        Some(path) => CompilerConfig::load(path),
        None => {
            let cwd = std::env::current_dir().context("Failed to read working directory")?;
            tracing::debug!(file = CONFIG_FILE, dir = %cwd.display(), "looking for configuration");
            CompilerConfig::discover(&cwd)
        }
    }
}
