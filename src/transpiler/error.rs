//! Error types for code generation
//!
//! Backend steps fail with a [`GenerateError`]. The shared transpile driver
//! wraps it into a [`TranspileError`] naming the stage, parameter or
//! implementation block that failed.

use std::fmt;
use thiserror::Error;

/// Result alias for individual generation steps.
pub type GenerateResult<T> = std::result::Result<T, GenerateError>;

/// Result alias for whole-program transpilation.
pub type TranspileResult<T> = std::result::Result<T, TranspileError>;

/// Fixed stages of the transpile driver, outside validators and handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Preamble before the signature.
    Header,
    /// Function, process or tool declaration.
    Signature,
    /// Domain-specific checks after the type validators.
    Guards,
    /// Fallback written when the program has no implementation block.
    NoImplementation,
    /// Closing section and entry point.
    Footer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Header => "header",
            Stage::Signature => "signature",
            Stage::Guards => "guards",
            Stage::NoImplementation => "no-implementation fallback",
            Stage::Footer => "footer",
        };
        f.write_str(name)
    }
}

/// Failure of a single generation step.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// A `run_docker` block without an `image` field
    #[error("Docker image not specified for implementation '{implementation}'")]
    MissingImage {
        /// Block kind
        implementation: String,
    },

    /// A required block field is absent or has the wrong shape
    #[error("field '{field}' is required by implementation '{implementation}'")]
    MissingField {
        /// Block kind
        implementation: String,
        /// Field name
        field: String,
    },

    /// Enum parameter without allowed values
    #[error("enum type requires constraints with allowed values (parameter '{parameter}')")]
    EmptyEnum {
        /// Parameter name
        parameter: String,
    },

    /// Construct the target cannot express
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Failure of a whole transpilation.
#[derive(Debug, Error)]
pub enum TranspileError {
    /// No backend registered under the requested name
    #[error("unsupported language '{0}'")]
    UnsupportedLanguage(String),

    /// A block kind with no registered handler
    #[error("no handler registered for implementation type '{implementation}'")]
    NoHandler {
        /// Block kind
        implementation: String,
    },

    /// A parameter type with no registered validator, under the strict policy
    #[error("no validator registered for type '{type_name}' (parameter '{parameter}')")]
    NoValidator {
        /// Parameter name
        parameter: String,
        /// Declared type
        type_name: String,
    },

    /// A type validator failed
    #[error("error validating parameter '{parameter}': {source}")]
    TypeValidation {
        /// Parameter name
        parameter: String,
        /// Underlying cause
        #[source]
        source: GenerateError,
    },

    /// An implementation handler failed
    #[error("error processing '{implementation}' implementation: {source}")]
    Implementation {
        /// Block kind
        implementation: String,
        /// Underlying cause
        #[source]
        source: GenerateError,
    },

    /// One of the fixed stages failed
    #[error("error generating {stage}: {source}")]
    Stage {
        /// Failing stage
        stage: Stage,
        /// Underlying cause
        #[source]
        source: GenerateError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implementation_error_names_block_and_cause() {
        let err = TranspileError::Implementation {
            implementation: "run_docker".into(),
            source: GenerateError::MissingImage {
                implementation: "run_docker".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "error processing 'run_docker' implementation: \
             Docker image not specified for implementation 'run_docker'"
        );
    }

    #[test]
    fn stage_error_names_stage() {
        let err = TranspileError::Stage {
            stage: Stage::Header,
            source: GenerateError::Unsupported("two blocks".into()),
        };
        assert_eq!(err.to_string(), "error generating header: unsupported: two blocks");
    }
}
