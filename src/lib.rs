//! Baryon – compiler for the bala workflow language
//!
//! bala programs are S-expressions describing a containerised tool: its
//! typed parameters, how to run it and what it produces. This crate
//! provides:
//! - A front end: tokenizer, S-expression reader and AST builder with
//!   accumulated, position-tagged diagnostics
//! - A pluggable code generation framework with per-type validators and
//!   per-construct handlers
//! - Backends for Bash, Python, R, Nextflow and Galaxy tool XML
//! - An importer turning Galaxy tool XML back into bala source

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Compiler configuration file
pub mod config;
/// Importers from other tool description formats
pub mod importer;
/// The bala language front end
pub mod lang;
/// Code generation
pub mod transpiler;
/// Filesystem helpers
pub mod util;

use thiserror::Error;

// Re-export key types for convenience
pub use config::CompilerConfig;
pub use lang::{ParseError, Program, parse_program};
pub use transpiler::{Backend, Registry, TranspileError};

/// Current version of the compiler
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Failure of [`compile`].
#[derive(Debug, Error)]
pub enum CompileError {
    /// The source did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The program could not be generated for the target.
    #[error(transparent)]
    Transpile(#[from] TranspileError),
}

/// Parse `source` and generate code for `language` with a backend from
/// `registry`.
pub fn compile(registry: &Registry, source: &str, language: &str) -> Result<String, CompileError> {
    let descriptor = registry.get(language)?;
    let program = parse_program(source)?;
    let mut backend = descriptor.create();
    Ok(backend.transpile(&program)?)
}
