//! Galaxy tool XML backend
//!
//! Emits a `<tool>` descriptor. Every parameter becomes a `<param>` in
//! `<inputs>`, so a type without a validator has no Galaxy form and fails
//! the run. A Galaxy tool runs one command, hence one implementation block.
//!
//! A `file` parameter annotated with `(galaxy_data_table "<table>")` is
//! offered as a selection from that data table and passed to the command as
//! `$name.fields.path`.

use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::lang::{ImplementationBlock, ImplementationKind, ParamType, Parameter, Program};

use super::error::{GenerateError, GenerateResult};
use super::support::{
    self, Argument, EnvValue, format_description, require_constraints, require_image,
    single_quoted, unescape,
};
use super::{Backend, BackendCore, Emitter, ValidatorPolicy};

/// Parameter metadata key naming a Galaxy data table.
pub const DATA_TABLE_KEY: &str = "galaxy_data_table";

/// Generates Galaxy tool descriptors.
pub struct GalaxyBackend {
    core: BackendCore,
}

impl GalaxyBackend {
    /// Backend with the `run_docker` handler and an input form for every
    /// built-in type.
    pub fn new() -> Self {
        let mut core = BackendCore::new(ValidatorPolicy::Strict);
        core.register_handler(ImplementationKind::RunDocker, handle_run_docker);
        for ty in ParamType::BUILTIN {
            core.register_validator(ty, write_param);
        }
        Self { core }
    }
}

impl Default for GalaxyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for GalaxyBackend {
    fn name(&self) -> &'static str {
        "galaxy"
    }

    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BackendCore {
        &mut self.core
    }

    fn write_header(&mut self, program: &Program) -> GenerateResult<()> {
        if program.implementations.len() > 1 {
            return Err(GenerateError::Unsupported(format!(
                "a Galaxy tool runs a single implementation block, found {}",
                program.implementations.len()
            )));
        }
        let version = program
            .metadata
            .get("version")
            .map(|version| unescape(version))
            .unwrap_or("0.1.0".into());

        let out = &mut self.core.emitter;
        open(
            out,
            "tool",
            &[
                ("id", program.name.as_str()),
                ("name", program.name.as_str()),
                ("version", &*version),
            ],
        )?;
        if let Some(description) = &program.description {
            element(out, "description", &[], &text_value(description))?;
        }
        Ok(())
    }

    fn write_signature(&mut self, _program: &Program) -> GenerateResult<()> {
        open(&mut self.core.emitter, "inputs", &[])
    }

    fn write_preset_parameter(&mut self, param: &Parameter) -> GenerateResult<()> {
        if !self.core.has_validator(&param.ty) {
            return Err(GenerateError::Unsupported(format!(
                "no Galaxy input for type '{}'",
                param.ty
            )));
        }
        write_param(&mut self.core.emitter, param)
    }

    fn write_guards(&mut self, _program: &Program) -> GenerateResult<()> {
        // Checks live on the <param> elements; this closes the form.
        close(&mut self.core.emitter, "inputs");
        Ok(())
    }

    fn write_no_implementation(&mut self, _program: &Program) -> GenerateResult<()> {
        element(
            &mut self.core.emitter,
            "command",
            &[],
            "echo 'No implementation defined for this tool' >&2 && exit 1",
        )
    }

    fn write_footer(&mut self, program: &Program) -> GenerateResult<()> {
        let out = &mut self.core.emitter;
        if program.outputs.is_empty() {
            empty(out, "outputs", &[])?;
        } else {
            open(out, "outputs", &[])?;
            for output in &program.outputs {
                let name = data_name(&output.name);
                let format = unescape(&output.format);
                let path = unescape(output.path.as_deref().unwrap_or(&output.name));
                let label = text_value(output.label());
                empty(
                    out,
                    "data",
                    &[
                        ("name", name.as_str()),
                        ("format", &*format),
                        ("from_work_dir", &*path),
                        ("label", label.as_str()),
                    ],
                )?;
            }
            close(out, "outputs");
        }
        if let Some(description) = &program.description {
            element(out, "help", &[], &text_value(description))?;
        }
        out.set_indent_level(0);
        out.line("</tool>");
        Ok(())
    }
}

/// One line of markup from a run of events. Attribute values and text are
/// escaped by the writer.
fn render<'a>(events: impl IntoIterator<Item = Event<'a>>) -> GenerateResult<String> {
    let mut writer = Writer::new(Vec::new());
    for event in events {
        writer.write_event(event).map_err(xml_error)?;
    }
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

fn xml_error(err: impl std::fmt::Display) -> GenerateError {
    GenerateError::Unsupported(format!("cannot write tool XML: {err}"))
}

fn tag<'a>(name: &'a str, attributes: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    BytesStart::new(name).with_attributes(attributes.iter().copied())
}

fn open(out: &mut Emitter, name: &str, attributes: &[(&str, &str)]) -> GenerateResult<()> {
    out.line(render([Event::Start(tag(name, attributes))])?);
    out.indent();
    Ok(())
}

fn close(out: &mut Emitter, name: &str) {
    out.dedent();
    out.line(format!("</{name}>"));
}

fn empty(out: &mut Emitter, name: &str, attributes: &[(&str, &str)]) -> GenerateResult<()> {
    out.line(render([Event::Empty(tag(name, attributes))])?);
    Ok(())
}

fn element(
    out: &mut Emitter,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> GenerateResult<()> {
    out.line(render([
        Event::Start(tag(name, attributes)),
        Event::Text(BytesText::from_escaped(partial_escape(text))),
        Event::End(BytesEnd::new(name)),
    ])?);
    Ok(())
}

/// Literal text as a single line with its source escapes resolved.
fn text_value(text: &str) -> String {
    unescape(&format_description(text)).into_owned()
}

/// Galaxy output names are identifiers.
fn data_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn data_table(param: &Parameter) -> Option<&str> {
    if param.ty != ParamType::File {
        return None;
    }
    param.metadata.get(DATA_TABLE_KEY).map(String::as_str)
}

fn write_param(out: &mut Emitter, param: &Parameter) -> GenerateResult<()> {
    let galaxy_type = match (&param.ty, data_table(param)) {
        (_, Some(_)) => "select",
        (ParamType::String | ParamType::Character, None) => "text",
        (ParamType::Number, None) => "float",
        (ParamType::Integer, None) => "integer",
        (ParamType::Boolean, None) => "boolean",
        (ParamType::Enum, None) => "select",
        (ParamType::File | ParamType::Directory, None) => "data",
        (ParamType::Other(name), None) => {
            return Err(GenerateError::Unsupported(format!(
                "no Galaxy input for type '{name}'"
            )));
        }
    };
    let mut attributes: Vec<(&str, String)> = vec![
        ("name", param.name.clone()),
        ("type", galaxy_type.to_string()),
    ];

    match param.ty {
        ParamType::File if data_table(param).is_none() => {
            let format = param.metadata.get("format").map(String::as_str).unwrap_or("data");
            attributes.push(("format", unescape(format).into_owned()));
        }
        ParamType::Directory => attributes.push(("format", "directory".to_string())),
        ParamType::Boolean => {
            attributes.push(("truevalue", format!("--{}", param.name)));
            attributes.push(("falsevalue", String::new()));
        }
        _ => {}
    }

    if let Some(default) = &param.default {
        if param.ty == ParamType::Boolean {
            let checked = default.as_bool().unwrap_or(false);
            attributes.push(("checked", checked.to_string()));
        } else {
            attributes.push(("value", unescape(default.text()).into_owned()));
        }
    }
    attributes.push((
        "label",
        text_value(param.description.as_deref().unwrap_or(&param.name)),
    ));
    if let Some(help) = param.metadata.get("help") {
        attributes.push(("help", text_value(help)));
    }
    let attributes: Vec<(&str, &str)> = attributes
        .iter()
        .map(|(key, value)| (*key, value.as_str()))
        .collect();

    if let Some(table) = data_table(param) {
        let table = unescape(table);
        open(out, "param", &attributes)?;
        open(out, "options", &[("from_data_table", &*table)])?;
        for (name, index) in [("value", "0"), ("name", "1"), ("path", "2")] {
            element(out, "column", &[("name", name), ("index", index)], "")?;
        }
        close(out, "options");
        close(out, "param");
        return Ok(());
    }

    match param.ty {
        ParamType::Enum => {
            let constraints = require_constraints(param)?;
            let selected = param.default.as_ref().map(|d| unescape(d.text()));
            open(out, "param", &attributes)?;
            for value in constraints {
                let value = unescape(value);
                if selected.as_deref() == Some(&*value) {
                    element(out, "option", &[("value", &*value), ("selected", "true")], &value)?;
                } else {
                    element(out, "option", &[("value", &*value)], &value)?;
                }
            }
            close(out, "param");
        }
        ParamType::Character => {
            open(out, "param", &attributes)?;
            empty(
                out,
                "validator",
                &[("type", "length"), ("min", "1"), ("max", "1")],
            )?;
            close(out, "param");
        }
        _ => empty(out, "param", &attributes)?,
    }
    Ok(())
}

fn handle_run_docker(
    out: &mut Emitter,
    block: &ImplementationBlock,
    program: &Program,
) -> GenerateResult<()> {
    let image = unescape(require_image(block)?);

    open(out, "requirements", &[])?;
    element(out, "container", &[("type", "docker")], &image)?;
    close(out, "requirements");

    let environment = support::environment(block, program);
    if !environment.is_empty() {
        open(out, "environment_variables", &[])?;
        for (key, value) in environment {
            let value = match value {
                EnvValue::Parameter(param) => format!("${}", param.name),
                EnvValue::Text(text) => unescape(text).into_owned(),
            };
            element(out, "environment_variable", &[("name", key)], &value)?;
        }
        close(out, "environment_variables");
    }
    if !block.pairs("volumes").is_empty() {
        tracing::debug!("Galaxy stages inputs itself; volume mappings are not emitted");
    }

    let words: Vec<String> = support::arguments(block, program)
        .into_iter()
        .map(|argument| match argument {
            Argument::Path(param) if data_table(param).is_some() => {
                format!("'${}.fields.path'", param.name)
            }
            Argument::Path(param) | Argument::Value(param) => format!("'${}'", param.name),
            Argument::Flag(param) => format!("${}", param.name),
            Argument::Constant(text) => single_quoted(text),
        })
        .collect();

    element(
        out,
        "command",
        &[("detect_errors", "exit_code")],
        &words.join(" "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::{FieldValue, Literal, parse_program};

    fn data_table_program() -> Program {
        let mut genome = Parameter::new("ref_genome", ParamType::File);
        genome.description = Some("Reference Genome".into());
        genome
            .metadata
            .insert(DATA_TABLE_KEY.into(), "fasta_indexes".into());

        let mut program = Program::new("test_tool");
        program.parameters.push(genome);
        program.implementations.push(
            ImplementationBlock::new(ImplementationKind::RunDocker)
                .with_field("image", FieldValue::Scalar(Literal::Str("ubuntu".into())))
                .with_field(
                    "arguments",
                    FieldValue::List(vec![Literal::Symbol("ref_genome".into())]),
                ),
        );
        program
    }

    #[test]
    fn data_table_parameter_becomes_select() {
        let out = GalaxyBackend::new()
            .transpile(&data_table_program())
            .expect("transpile");
        assert!(out.contains(r#"<options from_data_table="fasta_indexes">"#));
        assert!(out.contains(r#"<column name="path" index="2"></column>"#));
        assert!(out.contains("$ref_genome.fields.path"));
        assert!(out.contains(r#"<param name="ref_genome" type="select" label="Reference Genome">"#));
    }

    #[test]
    fn emits_complete_tool() {
        let program = parse_program(
            r#"(bala sort_bam (
                (desc "Sort a BAM & index it")
                (metadata (version "1.2"))
                (input file (format "bam"))
                (order enum ("coordinate" "name") (default "name"))
                (index boolean (default true))
                (threads integer (default 2))
                (run_docker
                    (image "samtools:1.17")
                    (command "samtools sort")
                    (arguments "-@" threads input index))
                (outputs (sorted.bam bam (desc "Sorted alignments")))
            ))"#,
        )
        .expect("parse");
        let out = GalaxyBackend::new().transpile(&program).expect("transpile");

        assert!(out.starts_with(r#"<tool id="sort_bam" name="sort_bam" version="1.2">"#));
        assert!(out.contains("<description>Sort a BAM &amp; index it</description>"));
        assert!(out.contains(r#"<param name="input" type="data" format="bam" label="input"/>"#));
        assert!(out.contains(r#"<option value="name" selected="true">name</option>"#));
        assert!(out.contains(
            r#"<param name="index" type="boolean" truevalue="--index" falsevalue="" checked="true" label="index"/>"#
        ));
        assert!(out.contains(r#"<param name="threads" type="integer" value="2" label="threads"/>"#));
        assert!(out.contains(r#"<container type="docker">samtools:1.17</container>"#));
        assert!(out.contains(
            r#"<command detect_errors="exit_code">'samtools' 'sort' '-@' '$threads' '$input' $index</command>"#
        ));
        assert!(out.contains("<help>Sort a BAM &amp; index it</help>"));
        assert!(out.contains(
            r#"<data name="sorted_bam" format="bam" from_work_dir="sorted.bam" label="Sorted alignments"/>"#
        ));
        assert!(out.ends_with("</tool>\n"));
    }

    #[test]
    fn rejects_second_block() {
        let mut program = data_table_program();
        program.implementations.push(program.implementations[0].clone());
        let err = GalaxyBackend::new().transpile(&program).unwrap_err();
        assert!(err.to_string().contains("single implementation block"));
    }

    #[test]
    fn unknown_type_is_fatal() {
        let mut program = data_table_program();
        program
            .parameters
            .push(Parameter::new("build", ParamType::Other("genomebuild".into())));
        let err = GalaxyBackend::new().transpile(&program).unwrap_err();
        assert!(err.to_string().contains("no validator registered for type 'genomebuild'"));
    }

    #[test]
    fn markup_in_text_stays_well_formed() {
        let program = parse_program(
            r#"(bala quote_tool (
                (desc "ends ]]> here & more")
                (label string (desc "a <b> \"c\""))
                (run_docker
                    (image "alpine")
                    (command "printf")
                    (arguments "a]]>b" "\"q\"" label))
            ))"#,
        )
        .expect("parse");
        let out = GalaxyBackend::new().transpile(&program).expect("transpile");

        let document = roxmltree::Document::parse(&out).expect("well-formed");
        let text = |tag: &str| {
            document
                .descendants()
                .find(|node| node.has_tag_name(tag))
                .and_then(|node| node.text())
                .map(str::to_string)
        };
        assert_eq!(text("description").as_deref(), Some("ends ]]> here & more"));
        assert_eq!(text("help").as_deref(), Some("ends ]]> here & more"));
        assert_eq!(
            text("command").as_deref(),
            Some(r#"'printf' 'a]]>b' '"q"' '$label'"#)
        );
        let label = document
            .descendants()
            .find(|node| node.attribute("name") == Some("label"))
            .and_then(|node| node.attribute("label"));
        assert_eq!(label, Some(r#"a <b> "c""#));
    }
}
