//! Behaviour shared by every registered backend
//!
//! Each test runs against all backends from `Registry::builtin()`, so a new
//! backend inherits the whole suite by being registered.

use baryon::lang::{FieldValue, ImplementationBlock, ImplementationKind, Literal, ParamType, Parameter, Program};
use baryon::transpiler::{Registry, TranspileError};
use baryon::{CompileError, compile, parse_program};

const ALIGN: &str = r#"
; Align reads against a reference genome
(bala align_reads
    (
        (desc "Align sequencing reads")
        (metadata (version "2.1") (return "A sorted BAM file"))
        (reads file (desc "FASTQ reads"))
        (reference file (desc "Reference genome"))
        (threads integer (default 4))
        (min_quality number)
        (sample string)
        (strand character)
        (mode enum ("fast" "sensitive"))
        (paired boolean)
        (run_docker
            (image "biocontainers/bwa:0.7.17")
            (command "bwa mem")
            (volumes (parent_folder "/data"))
            (env (LC_ALL "C"))
            (arguments "-t" threads reference reads paired))
        (outputs (aligned.bam bam (desc "Alignments")))
    )
)
"#;

fn backend_names() -> Vec<&'static str> {
    Registry::builtin().names()
}

fn generate(name: &str, program: &Program) -> Result<String, TranspileError> {
    let registry = Registry::builtin();
    let descriptor = registry.get(name)?;
    descriptor.create().transpile(program)
}

#[test]
fn every_backend_compiles_the_full_program() {
    let registry = Registry::builtin();
    for name in backend_names() {
        let code = compile(&registry, ALIGN, name)
            .unwrap_or_else(|err| panic!("{name} failed: {err}"));
        assert!(code.contains("biocontainers/bwa:0.7.17"), "{name} lost the image");
        assert!(code.contains("align_reads"), "{name} lost the program name");
        assert!(code.ends_with('\n'), "{name} output is not newline terminated");
    }
}

#[test]
fn language_lookup_is_case_insensitive() {
    let registry = Registry::builtin();
    let lower = compile(&registry, ALIGN, "python").expect("python");
    let upper = compile(&registry, ALIGN, "PYTHON").expect("PYTHON");
    assert_eq!(lower, upper);
}

#[test]
fn unknown_language_is_rejected() {
    let err = compile(&Registry::builtin(), ALIGN, "cobol").unwrap_err();
    assert!(matches!(err, CompileError::Transpile(TranspileError::UnsupportedLanguage(_))));
    assert_eq!(err.to_string(), "unsupported language 'cobol'");
}

#[test]
fn parse_errors_surface_through_compile() {
    let err = compile(&Registry::builtin(), "(bala broken ((x string)", "bash").unwrap_err();
    assert!(matches!(err, CompileError::Parse(_)));
    assert!(err.to_string().contains("missing closing parenthesis"));
}

#[test]
fn missing_image_fails_everywhere() {
    let program = parse_program(
        r#"(bala no_image ((input file) (run_docker (arguments input))))"#,
    )
    .expect("parse");
    for name in backend_names() {
        let err = generate(name, &program).unwrap_err();
        assert!(
            matches!(err, TranspileError::Implementation { .. }),
            "{name}: unexpected error {err:?}"
        );
        assert!(
            err.to_string()
                .contains("Docker image not specified for implementation 'run_docker'"),
            "{name}: {err}"
        );
    }
}

#[test]
fn every_backend_validates_every_builtin_type() {
    let registry = Registry::builtin();
    for descriptor in registry.descriptors() {
        let backend = descriptor.create();
        for ty in ParamType::BUILTIN {
            assert!(
                backend.core().has_validator(&ty),
                "{} has no validator for {ty}",
                descriptor.name
            );
        }
    }
}

#[test]
fn empty_enum_is_rejected_by_every_backend() {
    let mut program = Program::new("choose");
    program.parameters.push(Parameter::new("mode", ParamType::Enum));
    program.implementations.push(
        ImplementationBlock::new(ImplementationKind::RunDocker)
            .with_field("image", FieldValue::Scalar(Literal::Str("alpine".into()))),
    );

    for name in backend_names() {
        let err = generate(name, &program).unwrap_err();
        match &err {
            TranspileError::TypeValidation { parameter, .. } => assert_eq!(parameter, "mode"),
            other => panic!("{name}: unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("enum type requires constraints"), "{name}: {err}");
    }
}

#[test]
fn generation_is_idempotent() {
    let program = parse_program(ALIGN).expect("parse");
    for name in backend_names() {
        let first = generate(name, &program).expect("first");
        let second = generate(name, &program).expect("second");
        assert_eq!(first, second, "{name} output differs between instances");

        let registry = Registry::builtin();
        let mut backend = registry.get(name).expect("backend").create();
        let again = backend.transpile(&program).expect("again");
        let and_again = backend.transpile(&program).expect("and again");
        assert_eq!(again, and_again, "{name} output differs between runs");
    }
}

#[test]
fn programs_without_implementation_still_generate() {
    let program = parse_program(r#"(bala empty ((desc "Nothing to run") (x string)))"#)
        .expect("parse");
    for name in backend_names() {
        let code = generate(name, &program).unwrap_or_else(|err| panic!("{name}: {err}"));
        assert!(
            code.contains("No implementation defined"),
            "{name} has no failing fallback:\n{code}"
        );
    }
}

#[test]
fn unknown_block_kind_has_no_handler() {
    let mut program = Program::new("slurm");
    program.implementations.push(
        ImplementationBlock::new(ImplementationKind::Other("run_slurm".into()))
            .with_field("image", FieldValue::Scalar(Literal::Str("alpine".into()))),
    );
    for name in backend_names() {
        let err = generate(name, &program).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no handler registered for implementation type 'run_slurm'",
            "{name}"
        );
    }
}

#[test]
fn unknown_types_depend_on_the_backend_policy() {
    let program = parse_program(
        r#"(bala build ((genome genomebuild) (run_docker (image "alpine"))))"#,
    )
    .expect("parse");

    for name in ["bash", "python", "r"] {
        let code = generate(name, &program).expect(name);
        assert!(code.contains("# No specific validation for type 'genomebuild'"), "{name}");
    }
    let code = generate("nextflow", &program).expect("nextflow");
    assert!(code.contains("// No specific validation for type 'genomebuild'"));

    let err = generate("galaxy", &program).unwrap_err();
    assert!(matches!(err, TranspileError::NoValidator { ref parameter, .. } if parameter == "genome"));
}

#[test]
fn custom_handlers_extend_a_backend() {
    use baryon::transpiler::{Backend, BashBackend};

    let mut program = Program::new("slurm");
    program.implementations.push(
        ImplementationBlock::new(ImplementationKind::Other("run_slurm".into()))
            .with_field("partition", FieldValue::Scalar(Literal::Str("short".into()))),
    );

    let mut backend = BashBackend::new();
    backend.register_handler(ImplementationKind::Other("run_slurm".into()), |out, block, _| {
        out.line(format!("sbatch --partition={}", block.text("partition").unwrap_or("default")));
        Ok(())
    });
    let code = backend.transpile(&program).expect("transpile");
    assert!(code.contains("sbatch --partition=short"));
}
