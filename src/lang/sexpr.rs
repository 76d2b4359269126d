//! Generic S-expression reader.
//!
//! Turns the token stream into a tree of [`Node`]s without looking at what
//! any identifier means. The only errors raised here are about balance.

use super::lexer::{Lexer, Token, TokenKind};
use super::ParseError;

/// Deepest list nesting the reader accepts.
pub const MAX_DEPTH: usize = 256;

/// A node of the generic parenthesized tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A single non-parenthesis token.
    Leaf(Token),
    /// A parenthesized list, tagged with its opening parenthesis.
    List {
        /// The `(` token that opened the list.
        open: Token,
        /// Child nodes in source order.
        children: Vec<Node>,
    },
}

impl Node {
    /// The leaf token, or the opening parenthesis of a list.
    pub fn token(&self) -> &Token {
        match self {
            Node::Leaf(token) => token,
            Node::List { open, .. } => open,
        }
    }

    /// Children of a list; empty for leaves.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Leaf(_) => &[],
            Node::List { children, .. } => children,
        }
    }

    /// The token of a leaf node.
    pub fn as_leaf(&self) -> Option<&Token> {
        match self {
            Node::Leaf(token) => Some(token),
            Node::List { .. } => None,
        }
    }

    /// The literal of the first child when it is an identifier leaf.
    pub fn head_identifier(&self) -> Option<&str> {
        self.children()
            .first()
            .and_then(Node::as_leaf)
            .filter(|token| token.kind == TokenKind::Identifier)
            .map(|token| token.literal.as_str())
    }
}

/// Reads one balanced program form from a token stream.
///
/// Comment tokens are dropped before the reader sees them; every other token
/// keeps the position the lexer gave it.
pub struct Reader<I: Iterator<Item = Token>> {
    tokens: I,
    current: Token,
}

impl<I: Iterator<Item = Token>> Reader<I> {
    /// Create a reader and load the first significant token.
    pub fn new(mut tokens: I) -> Self {
        let current = next_significant(&mut tokens).unwrap_or_else(|| eof_at(0, 1, 1));
        Self { tokens, current }
    }

    fn advance(&mut self) {
        if self.current.kind == TokenKind::Eof {
            return;
        }
        self.current = match next_significant(&mut self.tokens) {
            Some(token) => token,
            None => eof_at(self.current.end, self.current.line, self.current.column),
        };
    }

    /// Skip to the first `(` and read the whole form it opens.
    ///
    /// Anything other than end of input after the form is an error, so an
    /// unmatched `)` never goes unnoticed.
    pub fn read_program(mut self) -> Result<Node, ParseError> {
        while !matches!(self.current.kind, TokenKind::LParen | TokenKind::Eof) {
            self.advance();
        }

        if self.current.kind == TokenKind::Eof {
            return Err(ParseError::at(
                &self.current,
                "unexpected end of input before program definition",
            ));
        }

        let root = self.read_node(0)?;

        match self.current.kind {
            TokenKind::Eof => Ok(root),
            TokenKind::RParen => Err(ParseError::at(
                &self.current,
                "unexpected ')' after program definition",
            )),
            kind => Err(ParseError::at(
                &self.current,
                format!(
                    "unexpected {} '{}' after program definition",
                    kind, self.current.literal
                ),
            )),
        }
    }

    fn read_node(&mut self, depth: usize) -> Result<Node, ParseError> {
        if self.current.kind != TokenKind::LParen {
            let leaf = Node::Leaf(self.current.clone());
            self.advance();
            return Ok(leaf);
        }
        if depth >= MAX_DEPTH {
            return Err(ParseError::at(
                &self.current,
                format!("nesting too deep (more than {MAX_DEPTH} levels)"),
            ));
        }

        let open = self.current.clone();
        self.advance();

        let mut children = Vec::new();
        loop {
            match self.current.kind {
                TokenKind::RParen => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    return Err(ParseError::at(
                        &self.current,
                        "missing closing parenthesis in S-expression",
                    ));
                }
                _ => children.push(self.read_node(depth + 1)?),
            }
        }

        Ok(Node::List { open, children })
    }
}

/// Tokenize `source` and read its program form.
pub fn read_tree(source: &str) -> Result<Node, ParseError> {
    Reader::new(Lexer::new(source)).read_program()
}

fn next_significant<I: Iterator<Item = Token>>(tokens: &mut I) -> Option<Token> {
    tokens.find(|token| token.kind != TokenKind::Comment)
}

fn eof_at(offset: usize, line: usize, column: usize) -> Token {
    Token {
        kind: TokenKind::Eof,
        literal: String::new(),
        line,
        column,
        start: offset,
        end: offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nested_lists() {
        let root = read_tree("(a (b c) \"d\")").expect("read");
        assert_eq!(root.children().len(), 3);
        assert_eq!(root.head_identifier(), Some("a"));
        assert_eq!(root.children()[1].children().len(), 2);
        assert_eq!(root.children()[2].token().literal, "d");
    }

    #[test]
    fn skips_leading_tokens_and_comments() {
        let root = read_tree("; header\nstray 42 (x ; inline\n y)").expect("read");
        let literals: Vec<&str> = root
            .children()
            .iter()
            .map(|node| node.token().literal.as_str())
            .collect();
        assert_eq!(literals, vec!["x", "y"]);
        assert_eq!(root.children()[1].token().line, 3);
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = read_tree("  ; nothing here").unwrap_err();
        assert!(
            err.to_string()
                .contains("unexpected end of input before program definition")
        );
    }

    #[test]
    fn unclosed_list_reports_missing_parenthesis() {
        let err = read_tree("(a (b c)").unwrap_err();
        assert!(err.to_string().contains("missing closing parenthesis"));
        assert_eq!(err.diagnostics()[0].line, 1);
    }

    #[test]
    fn trailing_close_paren_is_rejected() {
        let err = read_tree("(a b))").unwrap_err();
        assert!(err.to_string().contains("unexpected ')'"));
    }

    #[test]
    fn trailing_form_is_rejected() {
        let err = read_tree("(a) (b)").unwrap_err();
        assert!(err.to_string().contains("after program definition"));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let source = format!("(bala t {}", "(".repeat(200_000));
        let err = read_tree(&source).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("nesting too deep"), "{message}");
        assert!(message.starts_with("Line 1, Column "), "{message}");

        let nested = format!("{}{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(read_tree(&nested).is_ok());
    }
}
