//! Bash backend
//!
//! Emits a script defining one function named after the program. The
//! function parses `--name value` options, checks them with `[[ ... ]]` tests
//! and runs the container through an argument array. The script ends by
//! calling the function with its own arguments.

use crate::lang::{ImplementationBlock, ImplementationKind, ParamType, Parameter, Program};

use super::error::GenerateResult;
use super::support::{
    self, Argument, EnvValue, VolumeSource, format_description, require_constraints,
    require_image, single_quoted,
};
use super::{Backend, BackendCore, Emitter, ValidatorPolicy};

/// Generates Bash scripts.
pub struct BashBackend {
    core: BackendCore,
}

impl BashBackend {
    /// Backend with the `run_docker` handler and validators for every
    /// built-in type.
    pub fn new() -> Self {
        let mut core = BackendCore::new(ValidatorPolicy::Permissive);
        core.register_handler(ImplementationKind::RunDocker, handle_run_docker);
        core.register_validator(ParamType::String, validate_required);
        core.register_validator(ParamType::Number, validate_number);
        core.register_validator(ParamType::Integer, validate_integer);
        core.register_validator(ParamType::Boolean, validate_boolean);
        core.register_validator(ParamType::Character, validate_character);
        core.register_validator(ParamType::Enum, validate_enum);
        core.register_validator(ParamType::File, validate_required);
        core.register_validator(ParamType::Directory, validate_required);
        Self { core }
    }
}

impl Default for BashBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for BashBackend {
    fn name(&self) -> &'static str {
        "bash"
    }

    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BackendCore {
        &mut self.core
    }

    fn write_header(&mut self, program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        out.line("#!/usr/bin/env bash");
        out.line("set -euo pipefail");
        out.blank();
        out.line(format!("# {}", program.name));
        if let Some(description) = &program.description {
            out.line(format!("# {}", format_description(description)));
        }
        if !program.parameters.is_empty() {
            out.line("#");
            out.line("# Options:");
            for param in &program.parameters {
                let value = if param.ty == ParamType::Boolean {
                    String::new()
                } else {
                    format!(" <{}>", param.ty)
                };
                out.line(format!(
                    "#   --{}{value}  {}",
                    param.name,
                    support::parameter_doc(param)
                ));
            }
        }
        out.blank();
        Ok(())
    }

    fn write_signature(&mut self, program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        out.line(format!("{}() {{", program.name));
        out.indent();

        for param in &program.parameters {
            let initial = match (&param.default, &param.ty) {
                (Some(default), ParamType::Boolean) => match default.as_bool() {
                    Some(true) => "true".to_string(),
                    _ => "false".to_string(),
                },
                (Some(default), _) => single_quoted(default.text()),
                (None, ParamType::Boolean) => "false".to_string(),
                (None, _) => "\"\"".to_string(),
            };
            out.line(format!("local {}={initial}", param.name));
        }

        out.blank();
        out.line("while [[ $# -gt 0 ]]; do");
        out.indent();
        out.line("case \"$1\" in");
        out.indent();
        for param in &program.parameters {
            out.line(format!("--{})", param.name));
            out.indent();
            if param.ty == ParamType::Boolean {
                out.line(format!("{}=true", param.name));
                out.line("shift");
            } else {
                out.line(format!("{}=\"${{2:-}}\"", param.name));
                out.line("shift 2");
            }
            out.line(";;");
            out.dedent();
        }
        out.line("*)");
        out.indent();
        out.line("echo \"Unknown option: $1\" >&2");
        out.line("return 1");
        out.line(";;");
        out.dedent();
        out.dedent();
        out.line("esac");
        out.dedent();
        out.line("done");

        if !program.parameters.is_empty() {
            out.blank();
            out.line("# Parameter validation");
        }
        Ok(())
    }

    fn write_guards(&mut self, program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        let mut header_written = false;
        for param in program.path_parameters() {
            if !header_written {
                out.blank();
                out.line("# Path existence checks");
                header_written = true;
            }
            let test = match param.ty {
                ParamType::Directory => "-d",
                _ => "-f",
            };
            let name = &param.name;
            fail_if(
                out,
                format!("! -f /.dockerenv && ! {test} \"${name}\""),
                format!("{name}: ${name} does not exist"),
            );
        }
        Ok(())
    }

    fn write_no_implementation(&mut self, _program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        out.blank();
        out.line("# No implementation blocks found");
        out.line("echo \"No implementation defined for this function\" >&2");
        out.line("return 1");
        Ok(())
    }

    fn write_footer(&mut self, program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        out.set_indent_level(0);
        out.line("}");
        out.blank();
        out.line(format!("{} \"$@\"", program.name));
        Ok(())
    }
}

fn fail_if(out: &mut Emitter, test: String, message: String) {
    out.line(format!("if [[ {test} ]]; then"));
    out.indent();
    out.line(format!("echo \"{message}\" >&2"));
    out.line("return 1");
    out.dedent();
    out.line("fi");
}

fn validate_required(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    fail_if(
        out,
        format!("-z \"${name}\""),
        format!("--{name} is required"),
    );
    Ok(())
}

fn validate_number(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    fail_if(
        out,
        format!("! \"${name}\" =~ ^-?[0-9]+([.][0-9]+)?$"),
        format!("--{name} must be a number"),
    );
    Ok(())
}

fn validate_integer(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    fail_if(
        out,
        format!("! \"${name}\" =~ ^-?[0-9]+$"),
        format!("--{name} must be an integer"),
    );
    Ok(())
}

fn validate_boolean(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    fail_if(
        out,
        format!("\"${name}\" != true && \"${name}\" != false"),
        format!("--{name} must be true or false"),
    );
    Ok(())
}

fn validate_character(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    fail_if(
        out,
        format!("${{#{name}}} -ne 1"),
        format!("--{name} must be a single character"),
    );
    Ok(())
}

fn validate_enum(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let values: Vec<String> = require_constraints(param)?
        .iter()
        .map(|value| single_quoted(value))
        .collect();
    let name = &param.name;
    out.line(format!("case \"${name}\" in"));
    out.indent();
    out.line(format!("{}) ;;", values.join("|")));
    out.line("*)");
    out.indent();
    out.line(format!(
        "echo \"--{name} must be one of: {}\" >&2",
        require_constraints(param)?.join(", ")
    ));
    out.line("return 1");
    out.line(";;");
    out.dedent();
    out.dedent();
    out.line("esac");
    Ok(())
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
                out.line(format!(
                    "local {name}_dir=\"$(cd \"$(dirname \"${name}\")\" && pwd)\""
                ));
                out.line(format!("local {name}_filename=\"$(basename \"${name}\")\""));
            }
            out.line(format!("local main_mount_dir=\"${}_dir\"", first.name));
        }
        None => {
            out.line("# No file parameters found, using current directory");
            out.line("local main_mount_dir=\"$(pwd)\"");
        }
    }

    out.blank();
    out.line("local -a docker_cmd=(docker run --rm)");
    let volumes = support::volumes(block, program);
    if volumes.is_empty() {
        out.line("docker_cmd+=(-v \"$main_mount_dir:/data\")");
    }
    for volume in volumes {
        let source = match volume.source {
            VolumeSource::ParentFolder => "$main_mount_dir".to_string(),
            VolumeSource::Parameter(param) if param.ty.is_path() => format!("${}_dir", param.name),
            VolumeSource::Parameter(param) => format!("${}", param.name),
            VolumeSource::Host(path) => path.to_string(),
        };
        out.line(format!(
            "docker_cmd+=(-v \"{source}:{}\")",
            volume.target
        ));
    }
    for (key, value) in support::environment(block, program) {
        let pair = match value {
            EnvValue::Parameter(param) => format!("\"{key}=${}\"", param.name),
            EnvValue::Text(text) => single_quoted(&format!("{key}={text}")),
        };
        out.line(format!("docker_cmd+=(-e {pair})"));
    }
    out.line(format!("docker_cmd+=({})", single_quoted(image)));

    for argument in support::arguments(block, program) {
        match argument {
            Argument::Path(param) => {
                out.line(format!("docker_cmd+=(\"${}_filename\")", param.name))
            }
            Argument::Flag(param) => {
                out.line(format!("if [[ \"${}\" == true ]]; then", param.name));
                out.indent();
                out.line(format!("docker_cmd+=(--{})", param.name));
                out.dedent();
                out.line("fi");
            }
            Argument::Value(param) => out.line(format!("docker_cmd+=(\"${}\")", param.name)),
            Argument::Constant(text) => out.line(format!("docker_cmd+=({})", single_quoted(text))),
        }
    }

    out.blank();
    out.line("\"${docker_cmd[@]}\"");
    Ok(())
}
