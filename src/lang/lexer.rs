//! Tokenizer for bala source text.
//!
//! The lexer is a forward-only iterator: every call to [`Iterator::next`]
//! scans one more token, the last token is always a single [`TokenKind::Eof`],
//! and the iterator is exhausted afterwards.

use std::fmt;
use std::iter::FusedIterator;

/// Classification of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `bala`, `run_docker`, `string`, `_`, ...
    Identifier,
    /// Double-quoted string literal.
    String,
    /// Integer or decimal literal.
    Number,
    /// Single-quoted literal.
    Character,
    /// `;` comment running to the end of the line.
    Comment,
    /// End of input.
    Eof,
    /// A character the language does not recognise.
    Illegal,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::String => "STRING",
            TokenKind::Number => "NUMBER",
            TokenKind::Character => "CHARACTER",
            TokenKind::Comment => "COMMENT",
            TokenKind::Eof => "EOF",
            TokenKind::Illegal => "ILLEGAL",
        };
        f.write_str(name)
    }
}

/// A scanned token with its source position.
///
/// `line` and `column` are 1-based and point at the first character of the
/// token. `start..end` is the byte range the token occupies, quotes and the
/// comment marker included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token classification.
    pub kind: TokenKind,
    /// Token text. Strings and characters exclude their quotes, comments
    /// exclude the leading `;`.
    pub literal: String,
    /// 1-based line of the first character.
    pub line: usize,
    /// 1-based column of the first character.
    pub column: usize,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Token {
    /// Returns true when the token is an identifier spelled `text`.
    pub fn is_identifier(&self, text: &str) -> bool {
        self.kind == TokenKind::Identifier && self.literal == text
    }

    /// Returns true for string and character literals.
    pub fn is_text(&self) -> bool {
        matches!(self.kind, TokenKind::String | TokenKind::Character)
    }
}

/// Streaming tokenizer over a source string.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at the start of `src`.
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        match ch {
            '\n' => {
                self.line += 1;
                self.column = 1;
            }
            '\r' => {
                // `\r\n` counts as a single line break.
                if self.peek() == Some('\n') {
                    self.pos += 1;
                }
                self.line += 1;
                self.column = 1;
            }
            _ => self.column += 1,
        }
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.bump();
        }
    }

    fn scan(&mut self) -> Token {
        self.skip_whitespace();

        let (line, column, start) = (self.line, self.column, self.pos);
        let Some(ch) = self.peek() else {
            return self.token(TokenKind::Eof, String::new(), line, column, start);
        };

        let (kind, literal) = match ch {
            '(' => {
                self.bump();
                (TokenKind::LParen, "(".to_string())
            }
            ')' => {
                self.bump();
                (TokenKind::RParen, ")".to_string())
            }
            '"' => (TokenKind::String, self.read_quoted('"', line, column)),
            '\'' => (TokenKind::Character, self.read_quoted('\'', line, column)),
            ';' => (TokenKind::Comment, self.read_comment()),
            c if c.is_ascii_alphabetic() || c == '_' => {
                (TokenKind::Identifier, self.read_identifier())
            }
            c if c.is_ascii_digit() => (TokenKind::Number, self.read_number()),
            other => {
                self.bump();
                (TokenKind::Illegal, other.to_string())
            }
        };

        self.token(kind, literal, line, column, start)
    }

    fn token(
        &self,
        kind: TokenKind,
        literal: String,
        line: usize,
        column: usize,
        start: usize,
    ) -> Token {
        Token {
            kind,
            literal,
            line,
            column,
            start,
            end: self.pos,
        }
    }

    /// Reads a quoted literal. The opening quote is the current character.
    /// Escapes are kept verbatim in the returned text.
    fn read_quoted(&mut self, quote: char, line: usize, column: usize) -> String {
        self.bump();
        let content_start = self.pos;
        loop {
            match self.peek() {
                None => {
                    tracing::warn!(line, column, "unterminated {quote}-quoted literal");
                    return self.src[content_start..self.pos].to_string();
                }
                Some('\\') => {
                    self.bump();
                    if matches!(self.peek(), Some(c) if c == quote || c == '\\') {
                        self.bump();
                    }
                }
                Some(c) if c == quote => {
                    let content = self.src[content_start..self.pos].to_string();
                    self.bump();
                    return content;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn read_comment(&mut self) -> String {
        self.bump();
        let body_start = self.pos;
        while !matches!(self.peek(), None | Some('\n' | '\r')) {
            self.bump();
        }
        self.src[body_start..self.pos].to_string()
    }

    fn read_identifier(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn read_number(&mut self) -> String {
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else if c == '.' && !seen_dot {
                seen_dot = true;
                self.bump();
            } else {
                break;
            }
        }
        self.src[start..self.pos].to_string()
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.scan();
        if token.kind == TokenKind::Eof {
            self.finished = true;
        }
        Some(token)
    }
}

impl FusedIterator for Lexer<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_literals(src: &str) -> Vec<(TokenKind, String)> {
        Lexer::new(src).map(|t| (t.kind, t.literal)).collect()
    }

    #[test]
    fn scans_every_token_kind() {
        let tokens = kinds_and_literals("(identifier 'a' \"string\" 123 45.67\n;comment\n)");
        let expected = vec![
            (TokenKind::LParen, "("),
            (TokenKind::Identifier, "identifier"),
            (TokenKind::Character, "a"),
            (TokenKind::String, "string"),
            (TokenKind::Number, "123"),
            (TokenKind::Number, "45.67"),
            (TokenKind::Comment, "comment"),
            (TokenKind::RParen, ")"),
            (TokenKind::Eof, ""),
        ];
        let expected: Vec<(TokenKind, String)> = expected
            .into_iter()
            .map(|(k, l)| (k, l.to_string()))
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn ends_with_exactly_one_eof() {
        let mut lexer = Lexer::new("  ");
        assert_eq!(lexer.next().map(|t| t.kind), Some(TokenKind::Eof));
        assert!(lexer.next().is_none());
        assert!(lexer.next().is_none());
    }

    #[test]
    fn tracks_lines_and_columns() {
        let tokens: Vec<Token> = Lexer::new("(a\r\n  bb)\n\"x\"").collect();
        let positions: Vec<(usize, usize)> = tokens.iter().map(|t| (t.line, t.column)).collect();
        assert_eq!(positions, vec![(1, 1), (1, 2), (2, 3), (2, 5), (3, 1), (3, 4)]);
    }

    #[test]
    fn escaped_quote_does_not_terminate() {
        let tokens = kinds_and_literals(r#""say \"hi\"" next"#);
        assert_eq!(tokens[0], (TokenKind::String, r#"say \"hi\""#.to_string()));
        assert_eq!(tokens[1], (TokenKind::Identifier, "next".to_string()));
    }

    #[test]
    fn unterminated_string_keeps_partial_content() {
        let tokens = kinds_and_literals("(desc \"never closed");
        assert_eq!(tokens[2], (TokenKind::String, "never closed".to_string()));
        assert_eq!(tokens[3].0, TokenKind::Eof);
    }

    #[test]
    fn illegal_characters_are_single_tokens() {
        let tokens = kinds_and_literals("a.b -");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Identifier, "a".to_string()),
                (TokenKind::Illegal, ".".to_string()),
                (TokenKind::Identifier, "b".to_string()),
                (TokenKind::Illegal, "-".to_string()),
                (TokenKind::Eof, String::new()),
            ]
        );
    }

    #[test]
    fn number_takes_at_most_one_decimal_point() {
        let tokens = kinds_and_literals("1.2.3");
        assert_eq!(tokens[0], (TokenKind::Number, "1.2".to_string()));
        assert_eq!(tokens[1], (TokenKind::Illegal, ".".to_string()));
        assert_eq!(tokens[2], (TokenKind::Number, "3".to_string()));
    }

    #[test]
    fn spans_cover_quotes() {
        let token = Lexer::new("  \"ab\"").next().expect("token");
        assert_eq!((token.start, token.end), (2, 6));
        assert_eq!(token.column, 3);
    }
}
