//! Multi-target code generation.
//!
//! Every backend owns a [`BackendCore`]: an indentation-aware [`Emitter`],
//! the handlers it knows for implementation block kinds and the validators it
//! knows for parameter types. The [`Backend`] trait supplies the shared
//! [`Backend::transpile`] driver, so each backend only fills in the stages
//! that differ between targets. Backends are looked up by name through the
//! [`Registry`].

/// Bash backend.
pub mod bash;
/// Error types.
pub mod error;
/// Galaxy tool XML backend.
pub mod galaxy;
/// Nextflow backend.
pub mod nextflow;
/// Python backend.
pub mod python;
/// R backend.
pub mod r;
/// Backend lookup table.
pub mod registry;
/// Helpers shared by the backends.
pub mod support;

use std::collections::HashMap;
use std::sync::Arc;

use crate::lang::{ImplementationBlock, ImplementationKind, ParamType, Parameter, Program};

pub use bash::BashBackend;
pub use error::{GenerateError, GenerateResult, Stage, TranspileError, TranspileResult};
pub use galaxy::GalaxyBackend;
pub use nextflow::NextflowBackend;
pub use python::PythonBackend;
pub use r::RBackend;
pub use registry::{BackendDescriptor, Registry};

/// Emits guard code for one parameter.
pub type TypeValidator = Arc<dyn Fn(&mut Emitter, &Parameter) -> GenerateResult<()> + Send + Sync>;

/// Emits code for one implementation block.
pub type ImplementationHandler =
    Arc<dyn Fn(&mut Emitter, &ImplementationBlock, &Program) -> GenerateResult<()> + Send + Sync>;

/// Text buffer with an indentation level.
#[derive(Debug, Default, Clone)]
pub struct Emitter {
    buffer: String,
    indent: usize,
}

impl Emitter {
    /// Create an empty emitter at indentation level zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current indentation. Blank lines carry no
    /// indentation.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.buffer.push_str("  ");
            }
            self.buffer.push_str(text);
        }
        self.buffer.push('\n');
    }

    /// Write an empty line.
    pub fn blank(&mut self) {
        self.buffer.push('\n');
    }

    /// Increase the indentation by one level.
    pub fn indent(&mut self) {
        self.indent += 1;
    }

    /// Decrease the indentation by one level, stopping at zero.
    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Current indentation level.
    pub fn indent_level(&self) -> usize {
        self.indent
    }

    /// Set the indentation level.
    pub fn set_indent_level(&mut self, level: usize) {
        self.indent = level;
    }

    /// Text written so far.
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Clear the buffer and indentation.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.indent = 0;
    }

    /// Take the text written so far, leaving the emitter empty.
    pub fn take(&mut self) -> String {
        self.indent = 0;
        std::mem::take(&mut self.buffer)
    }
}

/// What to do with a parameter whose type has no validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorPolicy {
    /// Write a comment and carry on.
    Permissive,
    /// Fail the transpilation.
    Strict,
}

/// State shared by every backend.
pub struct BackendCore {
    /// Output buffer.
    pub emitter: Emitter,
    handlers: HashMap<ImplementationKind, ImplementationHandler>,
    validators: HashMap<ParamType, TypeValidator>,
    policy: ValidatorPolicy,
}

impl BackendCore {
    /// Create a core with no handlers or validators.
    pub fn new(policy: ValidatorPolicy) -> Self {
        Self {
            emitter: Emitter::new(),
            handlers: HashMap::new(),
            validators: HashMap::new(),
            policy,
        }
    }

    /// Register the handler for a block kind, replacing any previous one.
    pub fn register_handler<F>(&mut self, kind: ImplementationKind, handler: F)
    where
        F: Fn(&mut Emitter, &ImplementationBlock, &Program) -> GenerateResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(kind, Arc::new(handler));
    }

    /// Register the validator for a parameter type, replacing any previous one.
    pub fn register_validator<F>(&mut self, ty: ParamType, validator: F)
    where
        F: Fn(&mut Emitter, &Parameter) -> GenerateResult<()> + Send + Sync + 'static,
    {
        self.validators.insert(ty, Arc::new(validator));
    }

    /// Handler for a block kind.
    pub fn handler(&self, kind: &ImplementationKind) -> Option<ImplementationHandler> {
        self.handlers.get(kind).cloned()
    }

    /// Validator for a parameter type.
    pub fn validator(&self, ty: &ParamType) -> Option<TypeValidator> {
        self.validators.get(ty).cloned()
    }

    /// Whether a validator is registered for `ty`.
    pub fn has_validator(&self, ty: &ParamType) -> bool {
        self.validators.contains_key(ty)
    }

    /// Missing-validator policy.
    pub fn policy(&self) -> ValidatorPolicy {
        self.policy
    }
}

/// A code generation target.
///
/// Implementors provide the stage hooks; [`Backend::transpile`] runs them in
/// a fixed order:
///
/// 1. [`write_header`](Backend::write_header)
/// 2. [`write_signature`](Backend::write_signature)
/// 3. per parameter: [`write_preset_parameter`](Backend::write_preset_parameter)
///    when it has a default, otherwise its type validator
/// 4. [`write_guards`](Backend::write_guards)
/// 5. the handler of every implementation block, or
///    [`write_no_implementation`](Backend::write_no_implementation) when
///    there are none
/// 6. [`write_footer`](Backend::write_footer)
pub trait Backend {
    /// Registry name, e.g. `"python"`.
    fn name(&self) -> &'static str;

    /// Shared state.
    fn core(&self) -> &BackendCore;

    /// Shared state, mutably.
    fn core_mut(&mut self) -> &mut BackendCore;

    /// Line-comment marker of the target language.
    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    /// Preamble: shebang, imports, helpers.
    fn write_header(&mut self, program: &Program) -> GenerateResult<()>;

    /// Declaration derived from the program name and parameters.
    fn write_signature(&mut self, program: &Program) -> GenerateResult<()>;

    /// Called instead of the validator for a parameter with a default.
    fn write_preset_parameter(&mut self, _param: &Parameter) -> GenerateResult<()> {
        Ok(())
    }

    /// Checks beyond the per-type validators, e.g. path existence.
    fn write_guards(&mut self, _program: &Program) -> GenerateResult<()> {
        Ok(())
    }

    /// A statement that always fails, for programs without implementation.
    fn write_no_implementation(&mut self, program: &Program) -> GenerateResult<()>;

    /// Closing section and entry point.
    fn write_footer(&mut self, program: &Program) -> GenerateResult<()>;

    /// Register or replace the handler for a block kind.
    fn register_handler<F>(&mut self, kind: ImplementationKind, handler: F)
    where
        Self: Sized,
        F: Fn(&mut Emitter, &ImplementationBlock, &Program) -> GenerateResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.core_mut().register_handler(kind, handler);
    }

    /// Register or replace the validator for a parameter type.
    fn register_validator<F>(&mut self, ty: ParamType, validator: F)
    where
        Self: Sized,
        F: Fn(&mut Emitter, &Parameter) -> GenerateResult<()> + Send + Sync + 'static,
    {
        self.core_mut().register_validator(ty, validator);
    }

    /// Generate target code for `program`.
    ///
    /// The buffer is cleared on entry, so a failed run never leaks into the
    /// next one.
    fn transpile(&mut self, program: &Program) -> TranspileResult<String> {
        tracing::debug!(backend = self.name(), program = %program.name, "transpiling");
        self.core_mut().emitter.reset();

        self.write_header(program).map_err(at_stage(Stage::Header))?;
        self.write_signature(program)
            .map_err(at_stage(Stage::Signature))?;

        for param in &program.parameters {
            let wrap = |source| TranspileError::TypeValidation {
                parameter: param.name.clone(),
                source,
            };
            if param.default.is_some() {
                self.write_preset_parameter(param).map_err(wrap)?;
                continue;
            }
            match self.core().validator(&param.ty) {
                Some(validator) => validator(&mut self.core_mut().emitter, param).map_err(wrap)?,
                None => match self.core().policy() {
                    ValidatorPolicy::Permissive => {
                        tracing::warn!(
                            backend = self.name(),
                            parameter = %param.name,
                            type_name = %param.ty,
                            "no validator for parameter type"
                        );
                        let line = format!(
                            "{} No specific validation for type '{}'",
                            self.comment_prefix(),
                            param.ty
                        );
                        self.core_mut().emitter.line(line);
                    }
                    ValidatorPolicy::Strict => {
                        return Err(TranspileError::NoValidator {
                            parameter: param.name.clone(),
                            type_name: param.ty.to_string(),
                        });
                    }
                },
            }
        }

        self.write_guards(program).map_err(at_stage(Stage::Guards))?;

        if program.implementations.is_empty() {
            self.write_no_implementation(program)
                .map_err(at_stage(Stage::NoImplementation))?;
        }
        for block in &program.implementations {
            let handler =
                self.core()
                    .handler(&block.kind)
                    .ok_or_else(|| TranspileError::NoHandler {
                        implementation: block.kind.to_string(),
                    })?;
            handler(&mut self.core_mut().emitter, block, program).map_err(|source| {
                TranspileError::Implementation {
                    implementation: block.kind.to_string(),
                    source,
                }
            })?;
        }

        self.write_footer(program).map_err(at_stage(Stage::Footer))?;

        let output = self.core_mut().emitter.take();
        tracing::debug!(backend = self.name(), bytes = output.len(), "transpiled");
        Ok(output)
    }
}

fn at_stage(stage: Stage) -> impl FnOnce(GenerateError) -> TranspileError {
    move |source| TranspileError::Stage { stage, source }
}
