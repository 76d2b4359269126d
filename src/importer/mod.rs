//! Conversion of existing tool descriptors into bala source.

/// Galaxy tool XML importer.
pub mod galaxy;

use thiserror::Error;

/// Failure to import a tool descriptor.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The document is not well-formed XML.
    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The root element is not `<tool>`.
    #[error("expected a <tool> root element, found <{found}>")]
    MissingTool {
        /// Name of the root element found instead.
        found: String,
    },

    /// No `<container>` requirement to run the tool in.
    #[error("tool '{tool}' declares no container requirement")]
    MissingContainer {
        /// Id of the tool.
        tool: String,
    },
}

/// Result alias for importers.
pub type ImportResult<T> = Result<T, ImportError>;
