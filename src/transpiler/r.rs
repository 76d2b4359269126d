//! R backend
//!
//! Emits a single R function documented with roxygen comments. Arguments are
//! checked with `stop()` guards and the container runs through
//! `rrundocker::run_in_docker` inside a `tryCatch`.

use crate::lang::{ImplementationBlock, ImplementationKind, Literal, ParamType, Parameter, Program};

use super::error::GenerateResult;
use super::support::{
    self, Argument, EnvValue, VolumeSource, double_quoted, format_description, require_constraints,
    require_image,
};
use super::{Backend, BackendCore, Emitter, ValidatorPolicy};

/// Matches `..` as a whole path component, with either separator.
const TRAVERSAL_PATTERN: &str = r#""(^|[\\\\/])\\.\\.([\\\\/]|$)""#;

/// Generates R functions.
pub struct RBackend {
    core: BackendCore,
}

impl RBackend {
    /// Backend with the `run_docker` handler and validators for every
    /// built-in type.
    pub fn new() -> Self {
        let mut core = BackendCore::new(ValidatorPolicy::Permissive);
        core.register_handler(ImplementationKind::RunDocker, handle_run_docker);
        core.register_validator(ParamType::String, validate_string);
        core.register_validator(ParamType::Number, validate_number);
        core.register_validator(ParamType::Integer, validate_integer);
        core.register_validator(ParamType::Boolean, validate_boolean);
        core.register_validator(ParamType::Character, validate_character);
        core.register_validator(ParamType::Enum, validate_enum);
        core.register_validator(ParamType::File, validate_string);
        core.register_validator(ParamType::Directory, validate_string);
        Self { core }
    }
}

impl Default for RBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for RBackend {
    fn name(&self) -> &'static str {
        "r"
    }

    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BackendCore {
        &mut self.core
    }

    fn write_header(&mut self, program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        out.line(format!("#' {}", program.name));
        out.line("#'");
        if let Some(description) = &program.description {
            out.line(format!("#' @description {}", format_description(description)));
        }
        for param in &program.parameters {
            out.line(format!(
                "#' @param {} {}",
                param.name,
                support::parameter_doc(param)
            ));
        }
        out.line(format!("#' @return {}", support::return_doc(program)));
        out.line("#'");
        out.line("#' @export");
        Ok(())
    }

    fn write_signature(&mut self, program: &Program) -> GenerateResult<()> {
        let params: Vec<String> = program
            .parameters
            .iter()
            .map(|param| match &param.default {
                Some(default) => format!("{} = {}", param.name, default_value(default)),
                None => param.name.clone(),
            })
            .collect();

        let out = &mut self.core.emitter;
        out.line(format!(
            "{} <- function({}) {{",
            program.name,
            params.join(", ")
        ));
        out.indent();
        if !program.parameters.is_empty() {
            out.line("# Type validation");
        }
        Ok(())
    }

    fn write_guards(&mut self, program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;

        let mut header_written = false;
        for param in &program.parameters {
            if !matches!(
                param.ty,
                ParamType::String | ParamType::File | ParamType::Directory
            ) {
                continue;
            }
            if !header_written {
                out.blank();
                out.line("# Security checks");
                header_written = true;
            }
            out.line(format!(
                "if (grepl({TRAVERSAL_PATTERN}, {})) {{",
                param.name
            ));
            out.indent();
            out.line(format!(
                "stop(\"Path traversal detected in {}\")",
                param.name
            ));
            out.dedent();
            out.line("}");
        }

        for param in program.path_parameters() {
            let (check, kind) = match param.ty {
                ParamType::Directory => ("dir.exists", "directory"),
                _ => ("file.exists", "file"),
            };
            let name = &param.name;
            out.blank();
            out.line(format!("# Check if {kind} exists"));
            out.line("if (!rrundocker::is_running_in_docker()) {");
            out.indent();
            out.line(format!("if (!{check}({name})) {{"));
            out.indent();
            out.line(format!(
                "stop(paste(\"{name}:\", {name}, \"does not exist\"))"
            ));
            out.dedent();
            out.line("}");
            out.dedent();
            out.line("}");
        }
        Ok(())
    }

    fn write_no_implementation(&mut self, _program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        out.blank();
        out.line("# No implementation blocks found");
        out.line("stop(\"No implementation defined for this function\")");
        Ok(())
    }

    fn write_footer(&mut self, program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        if !program.implementations.is_empty() {
            out.blank();
            out.line("# Process result");
            out.line("return(list(");
            out.indent();
            out.line("status = \"success\",");
            out.line(format!(
                "output_dir = file.path(main_mount_dir, \"{}_results\")",
                program.name
            ));
            out.dedent();
            out.line("))");
        }
        out.set_indent_level(0);
        out.line("}");
        Ok(())
    }
}

fn default_value(literal: &Literal) -> String {
    match literal.as_bool() {
        Some(true) => "TRUE".to_string(),
        Some(false) => "FALSE".to_string(),
        None => support::literal_value(literal),
    }
}

fn stop_unless(out: &mut Emitter, failure: String, message: String) {
    out.line(format!("if ({failure}) {{"));
    out.indent();
    out.line(format!("stop({message})"));
    out.dedent();
    out.line("}");
}

fn validate_string(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    stop_unless(
        out,
        format!("!is.character({name}) || length({name}) != 1"),
        format!("\"{name} must be a single character string\""),
    );
    Ok(())
}

fn validate_number(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    stop_unless(
        out,
        format!("!is.numeric({name}) || length({name}) != 1"),
        format!("\"{name} must be a single numeric value\""),
    );
    Ok(())
}

fn validate_integer(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    stop_unless(
        out,
        format!("!is.numeric({name}) || length({name}) != 1 || {name} != round({name})"),
        format!("\"{name} must be a single integer value\""),
    );
    Ok(())
}

fn validate_character(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    stop_unless(
        out,
        format!("!is.character({name}) || length({name}) != 1 || nchar({name}) != 1"),
        format!("\"{name} must be a single character\""),
    );
    Ok(())
}

fn validate_boolean(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    stop_unless(
        out,
        format!("!is.logical({name}) || length({name}) != 1"),
        format!("\"{name} must be a single logical value (TRUE/FALSE)\""),
    );
    Ok(())
}

fn validate_enum(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let values: Vec<String> = require_constraints(param)?
        .iter()
        .map(|value| double_quoted(value))
        .collect();
    let name = &param.name;
    out.line(format!("valid_{name} <- c({})", values.join(", ")));
    stop_unless(
        out,
        format!("!is.character({name}) || length({name}) != 1 || !({name} %in% valid_{name})"),
        format!("paste0(\"{name} must be one of: \", paste(valid_{name}, collapse = \", \"))"),
    );
    Ok(())
}

/// Writes `head` … `)` blocks separated by commas, the R way.
fn write_arguments(out: &mut Emitter, first: String, sections: Vec<(String, Vec<String>)>) {
    if sections.is_empty() {
        out.line(first);
        return;
    }
    out.line(format!("{first},"));
    let last_section = sections.len() - 1;
    for (index, (head, items)) in sections.into_iter().enumerate() {
        out.line(head);
        out.indent();
        let last_item = items.len().saturating_sub(1);
        for (i, item) in items.into_iter().enumerate() {
            if i == last_item {
                out.line(item);
            } else {
                out.line(format!("{item},"));
            }
        }
        out.dedent();
        out.line(if index == last_section { ")" } else { ")," });
    }
}

fn handle_run_docker(
    out: &mut Emitter,
    block: &ImplementationBlock,
    program: &Program,
) -> GenerateResult<()> {
    let image = require_image(block)?;
    let paths: Vec<&Parameter> = program.path_parameters().collect();

    out.blank();
    out.line("# Process file paths for Docker volume mounting");
    match paths.first() {
        Some(first) => {
            for param in &paths {
                let name = &param.name;
                out.line(format!("# Process {name} for Docker"));
                out.line(format!(
                    "{name}_abspath <- normalizePath({name}, mustWork = FALSE)"
                ));
                out.line(format!("{name}_dir <- dirname({name}_abspath)"));
                out.line(format!("{name}_filename <- basename({name})"));
            }
            out.blank();
            out.line("# Main volume mount point");
            out.line(format!("main_mount_dir <- {}_dir", first.name));
        }
        None => {
            out.line("# No file parameters found, using current directory");
            out.line("main_mount_dir <- normalizePath(getwd(), mustWork = FALSE)");
        }
    }

    let mut volumes: Vec<String> = support::volumes(block, program)
        .into_iter()
        .map(|volume| {
            let target = double_quoted(volume.target);
            match volume.source {
                VolumeSource::ParentFolder => format!("c(main_mount_dir, {target})"),
                VolumeSource::Parameter(param) if param.ty.is_path() => {
                    format!("c({}_dir, {target})", param.name)
                }
                VolumeSource::Parameter(param) => format!("c({}, {target})", param.name),
                VolumeSource::Host(path) => format!("c({}, {target})", double_quoted(path)),
            }
        })
        .collect();
    if volumes.is_empty() {
        volumes.push("c(main_mount_dir, \"/data\")".to_string());
    }

    let env: Vec<String> = support::environment(block, program)
        .into_iter()
        .map(|(key, value)| match value {
            EnvValue::Parameter(param) => {
                format!("{} = as.character({})", double_quoted(key), param.name)
            }
            EnvValue::Text(text) => format!("{} = {}", double_quoted(key), double_quoted(text)),
        })
        .collect();

    let arguments: Vec<String> = support::arguments(block, program)
        .into_iter()
        .map(|argument| match argument {
            Argument::Path(param) => format!("{}_filename", param.name),
            Argument::Flag(param) => {
                format!("if ({0}) \"--{0}\" else character(0)", param.name)
            }
            Argument::Value(param) if matches!(param.ty, ParamType::Number | ParamType::Integer) => {
                format!("as.character({})", param.name)
            }
            Argument::Value(param) => param.name.clone(),
            Argument::Constant(text) => double_quoted(text),
        })
        .collect();

    let mut sections = vec![("volumes = list(".to_string(), volumes)];
    if !env.is_empty() {
        sections.push(("env = c(".to_string(), env));
    }
    if !arguments.is_empty() {
        sections.push(("additional_arguments = c(".to_string(), arguments));
    }

    out.blank();
    out.line("# Execute Docker container with error handling");
    out.line("tryCatch({");
    out.indent();
    out.line("rrundocker::run_in_docker(");
    out.indent();
    write_arguments(out, format!("image_name = {}", double_quoted(image)), sections);
    out.dedent();
    out.line(")");
    out.dedent();
    out.line("}, error = function(e) {");
    out.indent();
    out.line("stop(paste(\"Docker execution failed:\", e$message))");
    out.dedent();
    out.line("})");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parse_program;

    const SOURCE: &str = r#"
    (bala align
        (
            (desc "Align reads
                   against a reference")
            (reads file (desc "Input reads"))
            (mode enum ("fast" "slow"))
            (threads integer (default 4))
            (verbose boolean)
            (run_docker
                (image "aligner:1.0")
                (volumes (parent_folder "/data"))
                (env (MODE mode))
                (arguments reads "--threads" threads verbose _))
        )
    )
    "#;

    fn generate() -> String {
        let program = parse_program(SOURCE).expect("parse");
        RBackend::new().transpile(&program).expect("transpile")
    }

    #[test]
    fn documents_and_declares_function() {
        let out = generate();
        assert!(out.starts_with("#' align\n#'\n#' @description Align reads against a reference\n"));
        assert!(out.contains("#' @param reads Input reads\n"));
        assert!(out.contains("#' @param mode Parameter of type 'enum' (allowed values: fast, slow)\n"));
        assert!(out.contains("align <- function(reads, mode, threads = 4, verbose) {\n"));
        assert!(out.ends_with("  ))\n}\n"));
    }

    #[test]
    fn skips_validation_of_defaulted_parameters() {
        let out = generate();
        assert!(out.contains("valid_mode <- c(\"fast\", \"slow\")"));
        assert!(out.contains("!is.logical(verbose)"));
        assert!(!out.contains("threads must be a single integer value"));
    }

    #[test]
    fn resolves_docker_arguments() {
        let out = generate();
        assert!(out.contains("image_name = \"aligner:1.0\",\n"));
        assert!(out.contains("c(main_mount_dir, \"/data\")\n"));
        assert!(out.contains("\"MODE\" = as.character(mode)\n"));
        assert!(out.contains("reads_filename,\n"));
        assert!(out.contains("\"--threads\",\n"));
        assert!(out.contains("as.character(threads),\n"));
        assert!(out.contains("if (verbose) \"--verbose\" else character(0)\n"));
        assert!(out.contains("main_mount_dir <- reads_dir"));
    }

    #[test]
    fn guards_paths() {
        let out = generate();
        assert!(out.contains("stop(\"Path traversal detected in reads\")"));
        assert!(out.contains("if (!file.exists(reads)) {"));
    }

    #[test]
    fn program_without_blocks_stops() {
        let program = parse_program("(bala empty ((x string)))").expect("parse");
        let out = RBackend::new().transpile(&program).expect("transpile");
        assert!(out.contains("stop(\"No implementation defined for this function\")"));
    }

    #[test]
    fn every_block_runs_before_returning() {
        let mut program = parse_program(SOURCE).expect("parse");
        program.implementations.push(program.implementations[0].clone());
        let out = RBackend::new().transpile(&program).expect("transpile");

        assert_eq!(out.matches("rrundocker::run_in_docker(").count(), 2);
        assert_eq!(out.matches("return(list(").count(), 1);
        let last_run = out.rfind("rrundocker::run_in_docker(").expect("run");
        let result = out.find("return(list(").expect("return");
        assert!(last_run < result);
        assert!(out.contains("\n  return(list(\n    status = \"success\",\n"));
    }
}
