//! Interpretation of implementation blocks shared by the backends.
//!
//! Backends differ in how they spell things, not in what an argument or a
//! volume means. The classification lives here so every target agrees.

use std::borrow::Cow;

use crate::lang::{ImplementationBlock, Literal, ParamType, Parameter, Program};

use super::error::{GenerateError, GenerateResult};

/// Argument that stands for nothing.
pub const PLACEHOLDER: &str = "_";

/// Collapse a multi-line description into one line.
pub fn format_description(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Description of a parameter for generated documentation, listing the
/// allowed values of an enum.
pub fn parameter_doc(param: &Parameter) -> String {
    let mut doc = param.help_text();
    if param.ty == ParamType::Enum && !param.constraints.is_empty() {
        doc.push_str(&format!(
            " (allowed values: {})",
            param.constraints.join(", ")
        ));
    }
    format_description(&doc)
}

/// Return value description from the `return` metadata key.
pub fn return_doc(program: &Program) -> String {
    let text = program
        .metadata
        .get("return")
        .map(String::as_str)
        .unwrap_or("Results of the operation");
    format_description(text)
}

/// The non-empty `image` of a container block.
pub fn require_image(block: &ImplementationBlock) -> GenerateResult<&str> {
    match block.text("image") {
        Some(image) if !image.trim().is_empty() => Ok(image),
        _ => Err(GenerateError::MissingImage {
            implementation: block.kind.to_string(),
        }),
    }
}

/// Fail unless an enum parameter lists its allowed values.
pub fn require_constraints(param: &Parameter) -> GenerateResult<&[String]> {
    if param.constraints.is_empty() {
        return Err(GenerateError::EmptyEnum {
            parameter: param.name.clone(),
        });
    }
    Ok(&param.constraints)
}

/// One entry of an `arguments` list, resolved against the program.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument<'a> {
    /// A file or directory parameter: pass its name inside the mount.
    Path(&'a Parameter),
    /// A boolean parameter: pass `--name` when set.
    Flag(&'a Parameter),
    /// Any other parameter: pass its value.
    Value(&'a Parameter),
    /// Text passed through as written.
    Constant(&'a str),
}

/// Resolve the `command` and `arguments` of a block, in that order.
///
/// `command` is split on whitespace. Only bare identifiers can refer to
/// parameters, and `_` placeholders are dropped.
pub fn arguments<'a>(block: &'a ImplementationBlock, program: &'a Program) -> Vec<Argument<'a>> {
    let mut resolved: Vec<Argument<'a>> = block
        .text("command")
        .map(|command| command.split_whitespace().map(Argument::Constant).collect())
        .unwrap_or_default();

    for literal in block.list("arguments") {
        let Some(symbol) = literal.as_symbol() else {
            resolved.push(Argument::Constant(literal.text()));
            continue;
        };
        if symbol == PLACEHOLDER {
            continue;
        }
        resolved.push(match program.parameter(symbol) {
            Some(param) if param.ty.is_path() => Argument::Path(param),
            Some(param) if param.ty == ParamType::Boolean => Argument::Flag(param),
            Some(param) => Argument::Value(param),
            None => Argument::Constant(symbol),
        });
    }
    resolved
}

/// Host side of a volume mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeSource<'a> {
    /// Directory containing the given path parameter.
    Parameter(&'a Parameter),
    /// The main mount directory computed for the run.
    ParentFolder,
    /// A host path written literally.
    Host(&'a str),
}

/// A resolved `(source target)` volume pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume<'a> {
    /// Host side.
    pub source: VolumeSource<'a>,
    /// Path inside the container.
    pub target: &'a str,
}

/// Resolve the `volumes` pairs of a block.
pub fn volumes<'a>(block: &'a ImplementationBlock, program: &'a Program) -> Vec<Volume<'a>> {
    block
        .pairs("volumes")
        .iter()
        .map(|(source, target)| {
            let source = match source.as_str() {
                "parent_folder" | "parent-folder" => VolumeSource::ParentFolder,
                name => match program.parameter(name) {
                    Some(param) => VolumeSource::Parameter(param),
                    None => VolumeSource::Host(name),
                },
            };
            Volume {
                source,
                target: target.as_str(),
            }
        })
        .collect()
}

/// Value side of an `env` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue<'a> {
    /// The value of a parameter.
    Parameter(&'a Parameter),
    /// Literal text.
    Text(&'a str),
}

/// Resolve the `env` pairs of a block.
pub fn environment<'a>(
    block: &'a ImplementationBlock,
    program: &'a Program,
) -> Vec<(&'a str, EnvValue<'a>)> {
    block
        .pairs("env")
        .iter()
        .map(|(key, value)| {
            let value = match program.parameter(value) {
                Some(param) => EnvValue::Parameter(param),
                None => EnvValue::Text(value.as_str()),
            };
            (key.as_str(), value)
        })
        .collect()
}

/// Resolve the escapes a quoted literal keeps from the source.
///
/// `\"`, `\'` and `\\` stand for the escaped character. Any other
/// backslash is an ordinary character.
pub fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains('\\') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '"' | '\'' | '\\') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    Cow::Owned(out)
}

/// Wrap the value of a literal in double quotes, escaping quotes and
/// backslashes.
pub fn double_quoted(text: &str) -> String {
    let value = unescape(text);
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Wrap the value of a literal in single quotes for a POSIX shell.
pub fn single_quoted(text: &str) -> String {
    format!("'{}'", unescape(text).replace('\'', "'\\''"))
}

/// Render a literal as a quoted string or a bare number.
pub fn literal_value(literal: &Literal) -> String {
    match literal {
        Literal::Number(text) => text.clone(),
        other => double_quoted(other.text()),
    }
}
