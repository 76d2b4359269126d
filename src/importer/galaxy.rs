//! Galaxy tool XML to bala.
//!
//! The importer reads the parts of a `<tool>` that have a bala counterpart:
//! description, version, input params, the first Docker container, the
//! command line, environment variables and output datasets. Everything
//! else (tests, help, citations, macros) is ignored.

use roxmltree::{Document, Node};

use crate::lang::{BODY_KEYWORDS, PROGRAM_KEYWORD, ParamType};
use crate::transpiler::Emitter;

use super::{ImportError, ImportResult};

/// Convert a Galaxy tool descriptor into bala source.
pub fn import(xml: &str) -> ImportResult<String> {
    let document = Document::parse(xml)?;
    let tool = document.root_element();
    if !tool.has_tag_name("tool") {
        return Err(ImportError::MissingTool {
            found: tool.tag_name().name().to_string(),
        });
    }

    let id = tool
        .attribute("id")
        .or_else(|| tool.attribute("name"))
        .unwrap_or("tool");
    let image = tool
        .descendants()
        .filter(|node| node.has_tag_name("container"))
        .find(|node| node.attribute("type").unwrap_or("docker") == "docker")
        .and_then(|node| node.text())
        .map(str::trim)
        .filter(|image| !image.is_empty())
        .ok_or_else(|| ImportError::MissingContainer {
            tool: id.to_string(),
        })?;

    let mut out = Emitter::new();
    out.line(format!("({PROGRAM_KEYWORD} {}", identifier(id)));
    out.indent();
    out.line("(");
    out.indent();

    if let Some(description) = child_text(tool, "description") {
        out.line(format!("(desc {})", quoted(description)));
    }
    if let Some(version) = tool.attribute("version") {
        out.line(format!("(metadata (version {}))", quoted(version)));
    }

    let mut params = 0;
    if let Some(inputs) = child(tool, "inputs") {
        for param in inputs.descendants().filter(|node| node.has_tag_name("param")) {
            if let Some(line) = parameter(param) {
                out.line(line);
                params += 1;
            }
        }
    }

    out.line("(run_docker");
    out.indent();
    out.line(format!("(image {})", quoted(image)));
    if let Some(command) = child_text(tool, "command") {
        let command = command.split_whitespace().collect::<Vec<_>>().join(" ");
        out.line(format!("(command {})", quoted(&command)));
    }
    let variables: Vec<String> = tool
        .descendants()
        .filter(|node| node.has_tag_name("environment_variable"))
        .filter_map(|node| {
            let name = node.attribute("name")?;
            let value = node.text().unwrap_or("").trim();
            Some(format!("({} {})", identifier(name), quoted(value)))
        })
        .collect();
    if !variables.is_empty() {
        out.line(format!("(env {})", variables.join(" ")));
    }
    out.dedent();
    out.line(")");

    let outputs: Vec<String> = child(tool, "outputs")
        .map(|outputs| {
            outputs
                .children()
                .filter(|node| node.has_tag_name("data"))
                .filter_map(output)
                .collect()
        })
        .unwrap_or_default();
    if !outputs.is_empty() {
        out.line("(outputs");
        out.indent();
        for line in &outputs {
            out.line(line);
        }
        out.dedent();
        out.line(")");
    }

    out.dedent();
    out.line(")");
    out.dedent();
    out.line(")");

    tracing::debug!(tool = id, params, outputs = outputs.len(), "imported Galaxy tool");
    Ok(out.take())
}

/// Map a Galaxy `<param type>` onto a bala parameter type.
pub fn map_type(galaxy_type: &str) -> ParamType {
    match galaxy_type {
        "text" | "color" => ParamType::String,
        "integer" => ParamType::Integer,
        "float" => ParamType::Number,
        "boolean" => ParamType::Boolean,
        "data" => ParamType::File,
        "select" => ParamType::Enum,
        other => ParamType::Other(identifier(other)),
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(name))
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn parameter(param: Node<'_, '_>) -> Option<String> {
    let Some(name) = param
        .attribute("name")
        .or_else(|| param.attribute("argument").map(|arg| arg.trim_start_matches('-')))
    else {
        tracing::warn!("skipping Galaxy param without a name");
        return None;
    };
    let name = parameter_name(name);
    let galaxy_type = param.attribute("type").unwrap_or("text");
    let mut ty = map_type(galaxy_type);

    let options: Vec<Node<'_, '_>> = param
        .children()
        .filter(|node| node.has_tag_name("option"))
        .collect();
    if ty == ParamType::Enum && options.is_empty() {
        tracing::warn!(param = %name, "select without static options imported as string");
        ty = ParamType::String;
    }

    let mut parts = vec![name, ty.to_string()];
    if ty == ParamType::Enum {
        let values: Vec<String> = options
            .iter()
            .map(|option| quoted(option_value(*option)))
            .collect();
        parts.push(format!("({})", values.join(" ")));
    }
    if let Some(label) = param.attribute("label").filter(|label| !label.is_empty()) {
        parts.push(format!("(desc {})", quoted(label)));
    }
    if let Some(help) = param.attribute("help").filter(|help| !help.is_empty()) {
        parts.push(format!("(help {})", quoted(help)));
    }
    if ty == ParamType::File {
        if let Some(format) = param.attribute("format") {
            parts.push(format!("(format {})", quoted(format)));
        }
    }
    if let Some(default) = default_value(param, &ty, &options) {
        parts.push(format!("(default {default})"));
    }
    Some(format!("({})", parts.join(" ")))
}

fn option_value<'a>(option: Node<'a, '_>) -> &'a str {
    option
        .attribute("value")
        .or_else(|| option.text())
        .unwrap_or("")
}

fn default_value(param: Node<'_, '_>, ty: &ParamType, options: &[Node<'_, '_>]) -> Option<String> {
    match ty {
        ParamType::Boolean => {
            let checked = param.attribute("checked")?;
            Some(matches!(checked.to_ascii_lowercase().as_str(), "true" | "yes").to_string())
        }
        ParamType::Enum => options
            .iter()
            .find(|option| option.attribute("selected") == Some("true"))
            .map(|option| option_value(*option))
            .or_else(|| param.attribute("value"))
            .map(quoted),
        ParamType::File => None,
        ParamType::Integer | ParamType::Number => {
            let value = param.attribute("value").filter(|value| !value.is_empty())?;
            if is_plain_number(value) {
                Some(value.to_string())
            } else {
                Some(quoted(value))
            }
        }
        _ => param
            .attribute("value")
            .filter(|value| !value.is_empty())
            .map(quoted),
    }
}

fn output(data: Node<'_, '_>) -> Option<String> {
    let name = data.attribute("name")?;
    let format = data.attribute("format").unwrap_or("data");
    let mut line = format!("({} {}", identifier(name), quoted(format));
    if let Some(path) = data.attribute("from_work_dir") {
        line.push_str(&format!(" {}", quoted(path)));
    }
    if let Some(label) = data.attribute("label") {
        line.push_str(&format!(" (desc {})", quoted(label)));
    }
    line.push(')');
    Some(line)
}

/// A bala identifier: ASCII letters, digits and `_`, not starting with a
/// digit.
fn identifier(text: &str) -> String {
    let mut name: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}

/// Parameter identifier that cannot be read back as a body form.
fn parameter_name(text: &str) -> String {
    let name = identifier(text);
    if !BODY_KEYWORDS.contains(&name.as_str()) {
        return name;
    }
    let renamed = format!("{name}_param");
    tracing::warn!(param = %name, %renamed, "Galaxy param name is a bala keyword, renamed");
    renamed
}

/// A bala string literal. Backslashes and double quotes are escaped, and
/// the backends resolve those escapes when they quote the value.
fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn is_plain_number(text: &str) -> bool {
    text.starts_with(|c: char| c.is_ascii_digit())
        && text.chars().all(|c| c.is_ascii_digit() || c == '.')
        && text.matches('.').count() <= 1
}
