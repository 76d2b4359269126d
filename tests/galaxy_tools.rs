//! Galaxy tool descriptors in both directions
//!
//! Generating a tool from bala, importing tool XML into bala, and feeding
//! one into the other.

use baryon::importer::galaxy::import;
use baryon::lang::{ParamType, Program, parse_program};
use baryon::transpiler::support::unescape;
use baryon::transpiler::{Backend, BashBackend, GalaxyBackend};

const REFERENCE_TOOL: &str = r#"
(bala index_lookup
    (
        (desc "Look up a reference index")
        (ref_genome file (desc "Reference Genome") (galaxy_data_table "fasta_indexes"))
        (run_docker
            (image "ubuntu")
            (arguments ref_genome))
    )
)
"#;

#[test]
fn data_table_reference() {
    let program = parse_program(REFERENCE_TOOL).expect("parse");
    let xml = GalaxyBackend::new().transpile(&program).expect("transpile");

    assert!(xml.contains(r#"<options from_data_table="fasta_indexes">"#));
    assert!(xml.contains(r#"<column name="path" index="2"></column>"#));
    assert!(xml.contains("$ref_genome.fields.path"));
}

#[test]
fn generated_tool_is_well_formed_xml() {
    let program = parse_program(REFERENCE_TOOL).expect("parse");
    let xml = GalaxyBackend::new().transpile(&program).expect("transpile");

    let document = roxmltree::Document::parse(&xml).expect("well-formed");
    let tool = document.root_element();
    assert!(tool.has_tag_name("tool"));
    assert_eq!(tool.attribute("id"), Some("index_lookup"));
    let container = tool
        .descendants()
        .find(|node| node.has_tag_name("container"))
        .expect("container");
    assert_eq!(container.text(), Some("ubuntu"));
}

fn summary(program: &Program) -> Vec<(String, ParamType, Vec<String>)> {
    program
        .parameters
        .iter()
        .map(|param| (param.name.clone(), param.ty.clone(), param.constraints.clone()))
        .collect()
}

#[test]
fn exported_tool_imports_back() {
    let original = parse_program(
        r#"(bala trim_reads (
            (desc "Trim adapters")
            (metadata (version "1.0.3"))
            (reads file (desc "Input reads") (format "fastqsanger"))
            (quality integer (default 20))
            (ratio number (default 0.5))
            (adapter string)
            (mode enum ("single" "paired") (default "paired"))
            (keep boolean (default true))
            (run_docker
                (image "quay.io/biocontainers/cutadapt:4.4")
                (command "cutadapt")
                (arguments "-q" quality reads))
            (outputs (trimmed fastqsanger (desc "Trimmed reads")))
        ))"#,
    )
    .expect("parse");

    let xml = GalaxyBackend::new().transpile(&original).expect("transpile");
    let source = import(&xml).expect("import");
    let imported = parse_program(&source).expect("re-parse");

    assert_eq!(imported.name, original.name);
    assert_eq!(imported.description, original.description);
    assert_eq!(imported.metadata.get("version"), original.metadata.get("version"));
    assert_eq!(summary(&imported), summary(&original));

    for (left, right) in imported.parameters.iter().zip(&original.parameters) {
        assert_eq!(
            left.default.as_ref().map(|d| d.text().to_string()),
            right.default.as_ref().map(|d| d.text().to_string()),
            "default of {}",
            left.name
        );
    }
    assert_eq!(
        imported.parameter("reads").and_then(|p| p.metadata.get("format")),
        Some(&"fastqsanger".to_string())
    );

    let block = &imported.implementations[0];
    assert_eq!(block.text("image"), Some("quay.io/biocontainers/cutadapt:4.4"));
    assert_eq!(block.text("command"), Some("'cutadapt' '-q' '$quality' '$reads'"));

    assert_eq!(imported.outputs.len(), 1);
    assert_eq!(imported.outputs[0].name, "trimmed");
    assert_eq!(imported.outputs[0].format, "fastqsanger");
    assert_eq!(imported.outputs[0].description.as_deref(), Some("Trimmed reads"));
}

#[test]
fn imported_tool_compiles_to_every_target() {
    let xml = r#"<tool id="fastqc" name="FastQC" version="0.12.1">
        <description>Read quality reports</description>
        <requirements>
            <container type="docker">biocontainers/fastqc:0.12.1</container>
        </requirements>
        <command>fastqc --outdir . $input</command>
        <inputs>
            <param name="input" type="data" format="fastqsanger" label="Reads"/>
            <param name="kmers" type="integer" value="7" label="Kmer length"/>
            <param name="nogroup" type="boolean" checked="false" label="Disable grouping"/>
        </inputs>
        <outputs>
            <data name="report" format="html" from_work_dir="input_fastqc.html" label="Report"/>
        </outputs>
    </tool>"#;

    let source = import(xml).expect("import");
    let registry = baryon::Registry::builtin();
    for name in registry.names() {
        baryon::compile(&registry, &source, name)
            .unwrap_or_else(|err| panic!("{name}: {err}\n{source}"));
    }
}

#[test]
fn quotes_and_backslashes_survive_import() {
    let xml = r#"<tool id="echo_path">
        <requirements><container type="docker">alpine</container></requirements>
        <command>echo "hi" C:\dir</command>
        <inputs><param name="note" type="text" value="say &quot;x&quot; \ok"/></inputs>
    </tool>"#;

    let source = import(xml).expect("import");
    let program = parse_program(&source).expect("parse");
    let command = program.implementations[0].text("command").expect("command");
    assert_eq!(unescape(command), r#"echo "hi" C:\dir"#);
    let default = program.parameters[0].default.as_ref().expect("default");
    assert_eq!(unescape(default.text()), r#"say "x" \ok"#);

    let bash = BashBackend::new().transpile(&program).expect("bash");
    assert!(bash.contains(r#"docker_cmd+=('"hi"')"#));
    assert!(bash.contains(r"docker_cmd+=('C:\dir')"));

    let python = baryon::compile(&baryon::Registry::builtin(), &source, "python").expect("python");
    assert!(python.contains(r#"docker_args.append("\"hi\"")"#));
    assert!(python.contains(r#"docker_args.append("C:\\dir")"#));

    let tool = GalaxyBackend::new().transpile(&program).expect("galaxy");
    let document = roxmltree::Document::parse(&tool).expect("well-formed");
    let command = document
        .descendants()
        .find(|node| node.has_tag_name("command"))
        .and_then(|node| node.text());
    assert_eq!(command, Some(r#"'echo' '"hi"' 'C:\dir'"#));
}
