//! Nextflow backend
//!
//! Parameters become `params.*` declarations checked with Groovy `error`
//! calls. Each implementation block becomes one `process` running in its
//! container, and the closing `workflow` invokes them in order.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::lang::{ImplementationBlock, ImplementationKind, Literal, ParamType, Parameter, Program};

use super::error::GenerateResult;
use super::support::{
    self, Argument, EnvValue, VolumeSource, format_description, require_constraints,
    require_image, single_quoted, unescape,
};
use super::{Backend, BackendCore, Emitter, ValidatorPolicy};

/// Generates Nextflow DSL2 scripts.
pub struct NextflowBackend {
    core: BackendCore,
    /// Processes written in the current run, shared with the handler.
    processes: Arc<AtomicUsize>,
}

impl NextflowBackend {
    /// Backend with the `run_docker` handler and validators for every
    /// built-in type.
    pub fn new() -> Self {
        let processes = Arc::new(AtomicUsize::new(0));
        let mut core = BackendCore::new(ValidatorPolicy::Permissive);
        let counter = Arc::clone(&processes);
        core.register_handler(ImplementationKind::RunDocker, move |out, block, program| {
            let index = counter.fetch_add(1, Ordering::Relaxed);
            handle_run_docker(out, block, program, index)
        });
        core.register_validator(ParamType::String, validate_required);
        core.register_validator(ParamType::Number, validate_number);
        core.register_validator(ParamType::Integer, validate_integer);
        core.register_validator(ParamType::Boolean, validate_boolean);
        core.register_validator(ParamType::Character, validate_character);
        core.register_validator(ParamType::Enum, validate_enum);
        core.register_validator(ParamType::File, validate_required);
        core.register_validator(ParamType::Directory, validate_required);
        Self { core, processes }
    }
}

impl Default for NextflowBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Name of the process generated for the block at `index`.
pub fn process_name(block: &ImplementationBlock, index: usize) -> String {
    format!("{}_{}", block.kind, index + 1)
}

impl Backend for NextflowBackend {
    fn name(&self) -> &'static str {
        "nextflow"
    }

    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BackendCore {
        &mut self.core
    }

    fn comment_prefix(&self) -> &'static str {
        "//"
    }

    fn write_header(&mut self, program: &Program) -> GenerateResult<()> {
        self.processes.store(0, Ordering::Relaxed);
        let out = &mut self.core.emitter;
        out.line("#!/usr/bin/env nextflow");
        out.line("nextflow.enable.dsl = 2");
        out.blank();
        out.line(format!("// Nextflow Workflow: {}", program.name));
        if let Some(description) = &program.description {
            out.line(format!("// {}", format_description(description)));
        }
        out.blank();
        Ok(())
    }

    fn write_signature(&mut self, program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        out.line("// Input Parameters");
        for param in &program.parameters {
            if param.ty == ParamType::Enum && !param.constraints.is_empty() {
                out.line(format!(
                    "// Allowed values: {}",
                    param.constraints.join(", ")
                ));
            }
            let value = match &param.default {
                Some(default) => groovy_value(default),
                None if param.ty == ParamType::Boolean => "false".to_string(),
                None => "null".to_string(),
            };
            out.line(format!("params.{} = {value}", param.name));
        }
        if !program.parameters.is_empty() {
            out.blank();
            out.line("// Parameter validation");
        }
        Ok(())
    }

    fn write_guards(&mut self, program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        let mut header_written = false;
        for param in program.path_parameters() {
            if !header_written {
                out.blank();
                out.line("// Path existence checks");
                header_written = true;
            }
            let name = &param.name;
            error_if(
                out,
                format!("params.{name} != null && !file(params.{name}).exists()"),
                format!("{name}: ${{params.{name}}} does not exist"),
            );
        }
        Ok(())
    }

    fn write_no_implementation(&mut self, _program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        out.blank();
        out.line("// No implementation blocks found");
        out.line("error \"No implementation defined for this workflow\"");
        Ok(())
    }

    fn write_footer(&mut self, program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        out.set_indent_level(0);
        out.blank();
        out.line("workflow {");
        out.indent();
        for (index, block) in program.implementations.iter().enumerate() {
            out.line(format!("{}()", process_name(block, index)));
        }
        out.dedent();
        out.line("}");
        Ok(())
    }
}

fn groovy_value(literal: &Literal) -> String {
    match literal {
        Literal::Number(text) => text.clone(),
        other => match other.as_bool() {
            Some(value) => value.to_string(),
            None => groovy_quoted(other.text()),
        },
    }
}

/// A Groovy single-quoted string holding the value of a literal.
pub fn groovy_quoted(text: &str) -> String {
    let value = unescape(text);
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Escape literal text for a double-quoted Groovy string, where `$` would
/// start an interpolation.
fn gstring_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '"' | '$') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn error_if(out: &mut Emitter, condition: String, message: String) {
    out.line(format!("if ({condition}) {{"));
    out.indent();
    out.line(format!("error \"{message}\""));
    out.dedent();
    out.line("}");
}

fn validate_required(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    error_if(
        out,
        format!("params.{name} == null"),
        format!("Missing required parameter: --{name}"),
    );
    Ok(())
}

fn validate_number(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    error_if(
        out,
        format!("!(params.{name} instanceof Number)"),
        format!("--{name} must be a number"),
    );
    Ok(())
}

fn validate_integer(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    error_if(
        out,
        format!("!(params.{name} instanceof Integer || params.{name} instanceof Long)"),
        format!("--{name} must be an integer"),
    );
    Ok(())
}

fn validate_boolean(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    error_if(
        out,
        format!("!(params.{name} instanceof Boolean)"),
        format!("--{name} must be true or false"),
    );
    Ok(())
}

fn validate_character(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    error_if(
        out,
        format!("params.{name} == null || params.{name}.toString().length() != 1"),
        format!("--{name} must be a single character"),
    );
    Ok(())
}

fn validate_enum(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let constraints = require_constraints(param)?;
    let values: Vec<String> = constraints.iter().map(|value| groovy_quoted(value)).collect();
    let allowed: Vec<String> = constraints
        .iter()
        .map(|value| gstring_text(&unescape(value)))
        .collect();
    let name = &param.name;
    error_if(
        out,
        format!("!(params.{name} in [{}])", values.join(", ")),
        format!("--{name} must be one of: {}", allowed.join(", ")),
    );
    Ok(())
}

fn handle_run_docker(
    out: &mut Emitter,
    block: &ImplementationBlock,
    program: &Program,
    index: usize,
) -> GenerateResult<()> {
    let image = require_image(block)?;

    let mut options: Vec<String> = support::volumes(block, program)
        .into_iter()
        .map(|volume| {
            let source = match volume.source {
                VolumeSource::ParentFolder => "${launchDir}".to_string(),
                VolumeSource::Parameter(param) if param.ty.is_path() => {
                    format!("${{file(params.{}).parent}}", param.name)
                }
                VolumeSource::Parameter(param) => format!("${{params.{}}}", param.name),
                VolumeSource::Host(path) => gstring_text(&unescape(path)),
            };
            format!("-v {source}:{}", gstring_text(&unescape(volume.target)))
        })
        .collect();
    options.extend(
        support::environment(block, program)
            .into_iter()
            .map(|(key, value)| match value {
                EnvValue::Parameter(param) => format!("-e {key}=${{params.{}}}", param.name),
                EnvValue::Text(text) => format!("-e {key}={}", gstring_text(&unescape(text))),
            }),
    );

    let words: Vec<String> = support::arguments(block, program)
        .into_iter()
        .map(|argument| match argument {
            Argument::Path(param) | Argument::Value(param) => {
                format!("${{params.{}}}", param.name)
            }
            Argument::Flag(param) => {
                format!("${{params.{0} ? '--{0}' : ''}}", param.name)
            }
            Argument::Constant(text) => gstring_text(&shell_word(text)),
        })
        .collect();

    out.blank();
    out.line(format!("process {} {{", process_name(block, index)));
    out.indent();
    out.line(format!("container {}", groovy_quoted(image)));
    if !options.is_empty() {
        out.line(format!("containerOptions \"{}\"", options.join(" ")));
    }
    out.blank();
    out.line("output:");
    out.indent();
    if program.outputs.is_empty() {
        out.line("stdout");
    }
    for output in &program.outputs {
        let path = output.path.as_deref().unwrap_or(&output.name);
        out.line(format!("path {}", groovy_quoted(path)));
    }
    out.dedent();
    out.blank();
    out.line("script:");
    out.line("\"\"\"");
    if words.is_empty() {
        out.line("true");
    } else {
        out.line(words.join(" "));
    }
    out.line("\"\"\"");
    out.dedent();
    out.line("}");
    Ok(())
}

/// Leave plain words bare; quote anything a shell would split or expand.
fn shell_word(text: &str) -> String {
    let value = unescape(text);
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        value.into_owned()
    } else {
        single_quoted(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parse_program;

    const SOURCE: &str = r#"
    (bala assemble
        (
            (desc "Assemble contigs")
            (reads file)
            (kmer integer (default 31))
            (careful boolean)
            (preset enum ("meta" "isolate"))
            (run_docker
                (image "spades:3.15")
                (volumes (reads "/input"))
                (arguments "-s" reads "-k" kmer careful "--name" "my run"))
            (outputs (contigs.fasta fasta out/contigs.fasta))
        )
    )
    "#;

    fn generate() -> String {
        let program = parse_program(SOURCE).expect("parse");
        NextflowBackend::new().transpile(&program).expect("transpile")
    }

    #[test]
    fn declares_parameters() {
        let out = generate();
        assert!(out.contains("params.reads = null\n"));
        assert!(out.contains("params.kmer = 31\n"));
        assert!(out.contains("params.careful = false\n"));
        assert!(out.contains("// Allowed values: meta, isolate\n"));
        assert!(out.contains("if (!(params.preset in ['meta', 'isolate'])) {\n"));
        assert!(!out.contains("--kmer must be an integer"));
    }

    #[test]
    fn emits_process_and_workflow() {
        let out = generate();
        assert!(out.contains("process run_docker_1 {\n  container 'spades:3.15'\n"));
        assert!(out.contains("containerOptions \"-v ${file(params.reads).parent}:/input\"\n"));
        assert!(out.contains("path 'out/contigs.fasta'\n"));
        assert!(out.contains(
            "-s ${params.reads} -k ${params.kmer} ${params.careful ? '--careful' : ''} --name 'my run'\n"
        ));
        assert!(out.ends_with("workflow {\n  run_docker_1()\n}\n"));
    }

    #[test]
    fn checks_path_existence() {
        let out = generate();
        assert!(out.contains("if (params.reads != null && !file(params.reads).exists()) {\n"));
        assert!(out.contains("error \"reads: ${params.reads} does not exist\"\n"));
    }

    #[test]
    fn groovy_strings_escape_quotes() {
        let program = parse_program(
            r#"(bala quoting (
                (choice enum ("it's" "b") (default "it's"))
                (pattern string (default "C:\\tmp"))
                (run_docker
                    (image "repo/o'neil:1")
                    (arguments "cost $5" "say \"hi\""))
            ))"#,
        )
        .expect("parse");
        let out = NextflowBackend::new().transpile(&program).expect("transpile");

        assert!(out.contains(r"params.choice = 'it\'s'"));
        assert!(out.contains(r"params.pattern = 'C:\\tmp'"));
        assert!(out.contains(r"container 'repo/o\'neil:1'"));
        assert!(!out.contains(r"'\''"));
        assert!(out.contains(r#"'cost \$5' 'say \"hi\"'"#));

        let mut enum_only = program.clone();
        enum_only.parameters[0].default = None;
        let out = NextflowBackend::new().transpile(&enum_only).expect("transpile");
        assert!(out.contains(r"if (!(params.choice in ['it\'s', 'b'])) {"));
        assert!(out.contains(r#"error "--choice must be one of: it's, b""#));
    }

    #[test]
    fn handler_accepts_blocks_outside_the_program() {
        let program = parse_program(SOURCE).expect("parse");
        let backend = NextflowBackend::new();
        let handler = backend
            .core()
            .handler(&ImplementationKind::RunDocker)
            .expect("run_docker handler");

        let block = program.implementations[0].clone();
        let mut out = Emitter::new();
        handler(&mut out, &block, &program).expect("first");
        handler(&mut out, &block, &program).expect("second");
        assert!(out.as_str().contains("process run_docker_1 {"));
        assert!(out.as_str().contains("process run_docker_2 {"));
    }

    #[test]
    fn process_numbering_restarts_per_run() {
        let mut program = parse_program(SOURCE).expect("parse");
        program.implementations.push(program.implementations[0].clone());
        let mut backend = NextflowBackend::new();
        let first = backend.transpile(&program).expect("first");
        let second = backend.transpile(&program).expect("second");
        assert_eq!(first, second);
        assert!(first.contains("process run_docker_2 {"));
        assert!(first.ends_with("workflow {\n  run_docker_1()\n  run_docker_2()\n}\n"));
    }
}
