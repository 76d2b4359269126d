//! Front end of the bala language.
//!
//! Source text flows through three single-use stages: the [`lexer`] turns
//! characters into positioned tokens, the [`sexpr`] reader balances
//! parentheses into a generic tree, and the [`parser`] walks that tree into a
//! typed [`Program`]. Structural problems surface as a [`ParseError`] carrying
//! one [`Diagnostic`] per problem found.

/// Typed program model.
pub mod ast;
/// Tokenizer.
pub mod lexer;
/// Generic tree to typed program.
pub mod parser;
/// Generic S-expression reader.
pub mod sexpr;

use std::fmt;

use thiserror::Error;

pub use ast::{
    FieldValue, ImplementationBlock, ImplementationKind, Literal, OutputBlock, ParamType,
    Parameter, Program,
};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{BODY_KEYWORDS, PROGRAM_KEYWORD, build_program, parse_program};
pub use sexpr::{Node, Reader, read_tree};

/// A positioned parse problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based line of the offending token.
    pub line: usize,
    /// 1-based column of the offending token.
    pub column: usize,
    /// What went wrong.
    pub message: String,
}

impl Diagnostic {
    /// Diagnostic positioned at `token`.
    pub fn at(token: &Token, message: impl Into<String>) -> Self {
        Self {
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Line {}, Column {}: {}",
            self.line, self.column, self.message
        )
    }
}

/// Errors raised while turning source text into a [`Program`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// One or more structural problems, in the order they were found.
    #[error("{}", join_diagnostics(.diagnostics))]
    Syntax {
        /// Every problem found before parsing gave up.
        diagnostics: Vec<Diagnostic>,
    },
}

impl ParseError {
    /// Wrap a non-empty list of diagnostics.
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        ParseError::Syntax { diagnostics }
    }

    pub(crate) fn at(token: &Token, message: impl Into<String>) -> Self {
        Self::new(vec![Diagnostic::at(token, message)])
    }

    /// The individual problems.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ParseError::Syntax { diagnostics } => diagnostics,
        }
    }
}

fn join_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(Diagnostic::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_diagnostics_with_newlines() {
        let err = ParseError::new(vec![
            Diagnostic {
                line: 2,
                column: 5,
                message: "first".into(),
            },
            Diagnostic {
                line: 7,
                column: 1,
                message: "second".into(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Line 2, Column 5: first\nLine 7, Column 1: second"
        );
        assert_eq!(err.diagnostics().len(), 2);
    }
}
