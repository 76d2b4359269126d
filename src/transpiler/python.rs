//! Python backend
//!
//! Emits a self-contained module: helper functions, one typed function with a
//! docstring, `isinstance` checks, a `run_docker` call and an argparse entry
//! point.

use crate::lang::{ImplementationBlock, ImplementationKind, Literal, ParamType, Parameter, Program};

use super::error::GenerateResult;
use super::support::{
    self, Argument, EnvValue, VolumeSource, double_quoted, format_description, require_constraints,
    require_image,
};
use super::{Backend, BackendCore, Emitter, ValidatorPolicy};

/// Generates Python modules.
pub struct PythonBackend {
    core: BackendCore,
}

impl PythonBackend {
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
        core.register_validator(ParamType::File, validate_path);
        core.register_validator(ParamType::Directory, validate_path);
        Self { core }
    }
}

impl Default for PythonBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for PythonBackend {
    fn name(&self) -> &'static str {
        "python"
    }

    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BackendCore {
        &mut self.core
    }

    fn write_header(&mut self, _program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        for line in [
            "#!/usr/bin/env python3",
            "",
            "import logging",
            "import os",
            "import subprocess",
            "import sys",
            "from dataclasses import dataclass",
            "from typing import Dict, List",
            "",
            "logger = logging.getLogger(__name__)",
            "",
            "",
            "@dataclass",
            "class Result:",
        ] {
            out.line(line);
        }
        out.indent();
        out.line("status: str");
        out.line("output_dir: str");
        out.line("message: str = \"\"");
        out.dedent();
        out.blank();
        out.blank();

        out.line("def validate_path(path: str) -> str:");
        out.indent();
        out.line("\"\"\"Validate and normalize a file path.\"\"\"");
        out.line("if not path:");
        out.indent();
        out.line("raise ValueError(\"Path cannot be empty\")");
        out.dedent();
        out.line("return os.path.abspath(os.path.expanduser(path))");
        out.dedent();
        out.blank();
        out.blank();

        out.line("def is_running_in_docker() -> bool:");
        out.indent();
        out.line("\"\"\"Check if we're running inside a Docker container.\"\"\"");
        out.line("return os.path.exists(\"/.dockerenv\")");
        out.dedent();
        out.blank();
        out.blank();

        out.line(
            "def run_docker(image: str, volumes: Dict[str, str], env: Dict[str, str], args: List[str]) -> str:",
        );
        out.indent();
        out.line("\"\"\"Run a Docker container with specified parameters.\"\"\"");
        out.line("cmd = [\"docker\", \"run\", \"--rm\"]");
        out.line("for src, dst in volumes.items():");
        out.indent();
        out.line("cmd.extend([\"-v\", f\"{src}:{dst}\"])");
        out.dedent();
        out.line("for key, val in env.items():");
        out.indent();
        out.line("cmd.extend([\"-e\", f\"{key}={val}\"])");
        out.dedent();
        out.line("cmd.append(image)");
        out.line("cmd.extend(args)");
        out.blank();
        out.line("logger.info(\"Running Docker command: %s\", \" \".join(cmd))");
        out.line("result = subprocess.run(cmd, capture_output=True, text=True, check=False)");
        out.line("if result.returncode != 0:");
        out.indent();
        out.line("raise RuntimeError(f\"Docker execution failed: {result.stderr}\")");
        out.dedent();
        out.line("return result.stdout");
        out.dedent();
        out.blank();
        out.blank();
        Ok(())
    }

    fn write_signature(&mut self, program: &Program) -> GenerateResult<()> {
        // Python requires parameters with defaults to come last.
        let (required, optional): (Vec<&Parameter>, Vec<&Parameter>) = program
            .parameters
            .iter()
            .partition(|param| param.default.is_none());
        let params: Vec<String> = required
            .into_iter()
            .chain(optional)
            .map(|param| {
                let mut text = format!("{}: {}", param.name, annotation(&param.ty));
                if let Some(default) = &param.default {
                    text.push_str(" = ");
                    text.push_str(&default_value(default));
                }
                text
            })
            .collect();

        let out = &mut self.core.emitter;
        out.line(format!(
            "def {}({}) -> Result:",
            program.name,
            params.join(", ")
        ));
        out.indent();
        out.line("\"\"\"");
        if let Some(description) = &program.description {
            out.line(format_description(description));
            out.blank();
        }
        if !program.parameters.is_empty() {
            out.line("Parameters:");
            for param in &program.parameters {
                out.line(format!(
                    "    {}: {}",
                    param.name,
                    support::parameter_doc(param)
                ));
            }
            out.blank();
        }
        out.line("Returns:");
        out.line(format!("    Result: {}", support::return_doc(program)));
        out.line("\"\"\"");
        if !program.parameters.is_empty() {
            out.line("# Parameter validation");
        }
        Ok(())
    }

    fn write_preset_parameter(&mut self, param: &Parameter) -> GenerateResult<()> {
        // Guards and the handler read the normalized path.
        if param.ty.is_path() {
            let name = &param.name;
            self.core
                .emitter
                .line(format!("{name}_path = validate_path({name})"));
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
            let name = &param.name;
            let (check, error, kind) = match param.ty {
                ParamType::Directory => ("os.path.isdir", "NotADirectoryError", "Directory"),
                _ => ("os.path.isfile", "FileNotFoundError", "File"),
            };
            out.line(format!(
                "if not is_running_in_docker() and not {check}({name}_path):"
            ));
            out.indent();
            out.line(format!(
                "raise {error}(f\"{kind} {{{name}_path}} does not exist\")"
            ));
            out.dedent();
        }
        Ok(())
    }

    fn write_no_implementation(&mut self, _program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        out.blank();
        out.line("# No implementation blocks found");
        out.line("raise NotImplementedError(\"No implementation defined for this function\")");
        Ok(())
    }

    fn write_footer(&mut self, program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        // Every block has run once the body reaches this point.
        if !program.implementations.is_empty() {
            out.blank();
            out.line(format!(
                "output_dir = os.path.join(main_mount_dir, \"{}_results\")",
                program.name
            ));
            out.line("os.makedirs(output_dir, exist_ok=True)");
            out.line("return Result(status=\"success\", output_dir=output_dir)");
        }
        out.set_indent_level(0);
        out.blank();
        out.blank();
        out.line("if __name__ == \"__main__\":");
        out.indent();
        out.line("import argparse");
        out.blank();
        let description = program
            .description
            .as_deref()
            .map(format_description)
            .unwrap_or_default();
        out.line(format!(
            "parser = argparse.ArgumentParser(description={})",
            double_quoted(&description)
        ));

        for param in &program.parameters {
            let mut options = vec![double_quoted(&format!("--{}", param.name))];
            match param.ty {
                ParamType::Boolean => options.push("action=\"store_true\"".to_string()),
                ParamType::Integer => options.push("type=int".to_string()),
                ParamType::Number => options.push("type=float".to_string()),
                ParamType::Enum => {
                    let choices: Vec<String> =
                        param.constraints.iter().map(|c| double_quoted(c)).collect();
                    options.push(format!("choices=[{}]", choices.join(", ")));
                }
                _ => {}
            }
            match &param.default {
                Some(default) => options.push(format!("default={}", default_value(default))),
                None if param.ty != ParamType::Boolean => {
                    options.push("required=True".to_string())
                }
                None => {}
            }
            options.push(format!(
                "help={}",
                double_quoted(&format_description(&param.help_text()))
            ));
            out.line(format!("parser.add_argument({})", options.join(", ")));
        }

        out.blank();
        out.line("args = parser.parse_args()");
        out.line(format!("result = {}(", program.name));
        out.indent();
        for param in &program.parameters {
            out.line(format!("{0}=args.{0},", param.name));
        }
        out.dedent();
        out.line(")");
        out.line("print(f\"Status: {result.status}\")");
        out.line("if result.status != \"success\":");
        out.indent();
        out.line("print(f\"Error: {result.message}\", file=sys.stderr)");
        out.line("sys.exit(1)");
        out.dedent();
        out.line("print(f\"Output directory: {result.output_dir}\")");
        Ok(())
    }
}

fn annotation(ty: &ParamType) -> &'static str {
    match ty {
        ParamType::Number => "float",
        ParamType::Integer => "int",
        ParamType::Boolean => "bool",
        ParamType::String
        | ParamType::File
        | ParamType::Directory
        | ParamType::Character
        | ParamType::Enum => "str",
        ParamType::Other(_) => "object",
    }
}

fn default_value(literal: &Literal) -> String {
    match literal.as_bool() {
        Some(true) => "True".to_string(),
        Some(false) => "False".to_string(),
        None => support::literal_value(literal),
    }
}

fn raise_if(out: &mut Emitter, condition: String, raise: String) {
    out.line(format!("if {condition}:"));
    out.indent();
    out.line(format!("raise {raise}"));
    out.dedent();
}

fn type_error(name: &str, expected: &str) -> String {
    format!("TypeError(f\"{name} must be {expected}, got {{type({name}).__name__}}\")")
}

fn validate_string(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    raise_if(
        out,
        format!("not isinstance({name}, str)"),
        type_error(name, "a string"),
    );
    Ok(())
}

fn validate_number(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    raise_if(
        out,
        format!("not isinstance({name}, (int, float)) or isinstance({name}, bool)"),
        type_error(name, "a number"),
    );
    Ok(())
}

fn validate_integer(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    raise_if(
        out,
        format!("not isinstance({name}, int) or isinstance({name}, bool)"),
        type_error(name, "an integer"),
    );
    Ok(())
}

fn validate_boolean(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let name = &param.name;
    raise_if(
        out,
        format!("not isinstance({name}, bool)"),
        type_error(name, "a boolean"),
    );
    Ok(())
}

fn validate_character(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    validate_string(out, param)?;
    let name = &param.name;
    raise_if(
        out,
        format!("len({name}) != 1"),
        format!("ValueError(\"{name} must be a single character\")"),
    );
    Ok(())
}

fn validate_enum(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let values: Vec<String> = require_constraints(param)?
        .iter()
        .map(|value| double_quoted(value))
        .collect();
    let name = &param.name;
    out.line(format!("{name}_valid_values = [{}]", values.join(", ")));
    validate_string(out, param)?;
    raise_if(
        out,
        format!("{name} not in {name}_valid_values"),
        format!("ValueError(f\"{name} must be one of {{{name}_valid_values}}\")"),
    );
    Ok(())
}

fn validate_path(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    validate_string(out, param)?;
    let name = &param.name;
    out.line(format!("{name}_path = validate_path({name})"));
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
                out.line(format!("{name}_dir = os.path.dirname({name}_path)"));
                out.line(format!("{name}_filename = os.path.basename({name}_path)"));
            }
            out.line(format!("main_mount_dir = {}_dir", first.name));
        }
        None => {
            out.line("# No file parameters found, using current directory");
            out.line("main_mount_dir = os.path.abspath(os.getcwd())");
        }
    }

    out.blank();
    out.line("try:");
    out.indent();

    out.line("volumes = {}");
    let volumes = support::volumes(block, program);
    if volumes.is_empty() {
        out.line("volumes[main_mount_dir] = \"/data\"");
    }
    for volume in volumes {
        let target = double_quoted(volume.target);
        let source = match volume.source {
            VolumeSource::ParentFolder => "main_mount_dir".to_string(),
            VolumeSource::Parameter(param) if param.ty.is_path() => format!("{}_dir", param.name),
            VolumeSource::Parameter(param) => format!("str({})", param.name),
            VolumeSource::Host(path) => double_quoted(path),
        };
        out.line(format!("volumes[{source}] = {target}"));
    }

    out.line("env_vars = {}");
    for (key, value) in support::environment(block, program) {
        let value = match value {
            EnvValue::Parameter(param) => format!("str({})", param.name),
            EnvValue::Text(text) => double_quoted(text),
        };
        out.line(format!("env_vars[{}] = {value}", double_quoted(key)));
    }

    out.line("docker_args = []");
    for argument in support::arguments(block, program) {
        match argument {
            Argument::Path(param) => {
                out.line(format!("docker_args.append({}_filename)", param.name))
            }
            Argument::Flag(param) => {
                out.line(format!("if {}:", param.name));
                out.indent();
                out.line(format!("docker_args.append(\"--{}\")", param.name));
                out.dedent();
            }
            Argument::Value(param) => {
                out.line(format!("docker_args.append(str({}))", param.name))
            }
            Argument::Constant(text) => {
                out.line(format!("docker_args.append({})", double_quoted(text)))
            }
        }
    }

    out.blank();
    out.line(format!(
        "run_docker({}, volumes, env_vars, docker_args)",
        double_quoted(image)
    ));
    out.dedent();
    out.line("except Exception as e:");
    out.indent();
    out.line("logger.error(\"Docker execution failed: %s\", e)");
    out.line("return Result(status=\"error\", output_dir=\"\", message=str(e))");
    out.dedent();
    Ok(())
}
