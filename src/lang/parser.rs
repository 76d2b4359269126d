use std::collections::BTreeMap;

use super::ast::{
    FieldValue, ImplementationBlock, ImplementationKind, Literal, OutputBlock, ParamType,
    Parameter, Program, RUN_DOCKER,
};
use super::lexer::{Token, TokenKind};
use super::sexpr::{Node, read_tree};
use super::{Diagnostic, ParseError};

/// Identifier that must open every program.
pub const PROGRAM_KEYWORD: &str = "bala";

/// Heads of program body forms that are not parameters.
pub const BODY_KEYWORDS: [&str; 4] = ["desc", RUN_DOCKER, "outputs", "metadata"];

/// Parse bala source text into a [`Program`].
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let root = read_tree(source)?;
    let program = build_program(&root)?;
    tracing::debug!(
        program = %program.name,
        parameters = program.parameters.len(),
        implementations = program.implementations.len(),
        outputs = program.outputs.len(),
        "parsed program"
    );
    Ok(program)
}

/// Build a typed program from an already-read tree.
///
/// Problems with the root form fail immediately. Problems inside the body
/// are collected and reported together once the whole body has been walked.
pub fn build_program(root: &Node) -> Result<Program, ParseError> {
    let children = root.children();
    if children.len() < 3 {
        return Err(ParseError::at(
            root.token(),
            "invalid program structure: not enough elements",
        ));
    }
    if !children[0].token().is_identifier(PROGRAM_KEYWORD) {
        return Err(ParseError::at(
            children[0].token(),
            format!("program must start with '{PROGRAM_KEYWORD}'"),
        ));
    }
    let name_token = children[1].token();
    if children[1].as_leaf().is_none() || name_token.kind != TokenKind::Identifier {
        return Err(ParseError::at(name_token, "invalid program name"));
    }
    if children.len() > 3 {
        tracing::warn!(
            program = %name_token.literal,
            extra = children.len() - 3,
            "ignoring forms after the program body"
        );
    }

    let mut builder = Builder::default();
    let program = builder.program(&name_token.literal, &children[2]);
    if builder.diagnostics.is_empty() {
        Ok(program)
    } else {
        Err(ParseError::new(builder.diagnostics))
    }
}

#[derive(Default)]
struct Builder {
    diagnostics: Vec<Diagnostic>,
}

impl Builder {
    fn error(&mut self, token: &Token, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::at(token, message));
    }

    /// Report an illegal leaf. Returns true when one was reported.
    fn reject_illegal(&mut self, node: &Node) -> bool {
        match node.as_leaf() {
            Some(token) if token.kind == TokenKind::Illegal => {
                self.error(token, format!("unexpected character '{}'", token.literal));
                true
            }
            _ => false,
        }
    }

    fn program(&mut self, name: &str, body: &Node) -> Program {
        let mut program = Program::new(name);

        if body.as_leaf().is_some() {
            self.error(body.token(), "program body must be a list");
            return program;
        }

        for form in body.children() {
            if form.as_leaf().is_some() {
                self.reject_illegal(form);
                continue;
            }
            let items = form.children();
            let Some(head) = items.first() else {
                continue;
            };
            if self.reject_illegal(head) {
                continue;
            }
            let Some(keyword) = form.head_identifier() else {
                self.error(
                    head.token(),
                    format!("unexpected token {} in program body", head.token().kind),
                );
                continue;
            };

            match keyword {
                "desc" => {
                    if let Some(token) = string_leaf(items.get(1)) {
                        program.description = Some(token.literal.clone());
                    }
                }
                RUN_DOCKER => {
                    let block = self.implementation(ImplementationKind::RunDocker, &items[1..]);
                    program.implementations.push(block);
                }
                "outputs" => {
                    for entry in &items[1..] {
                        if let Some(output) = self.output(entry) {
                            program.outputs.push(output);
                        }
                    }
                }
                "metadata" => self.metadata(&items[1..], &mut program.metadata),
                _ => {
                    if let Some(param) = self.parameter(items) {
                        program.parameters.push(param);
                    }
                }
            }
        }

        program
    }

    fn metadata(&mut self, entries: &[Node], into: &mut BTreeMap<String, String>) {
        for entry in entries {
            if self.reject_illegal(entry) {
                continue;
            }
            let pair = entry.children();
            let key = pair
                .first()
                .and_then(Node::as_leaf)
                .filter(|token| token.kind == TokenKind::Identifier);
            let value = pair.get(1).and_then(Node::as_leaf).and_then(Literal::from_token);
            match (key, value) {
                (Some(key), Some(value)) if pair.len() == 2 => {
                    into.insert(key.literal.clone(), value.text().to_string());
                }
                _ => self.error(entry.token(), "metadata entries must be (key value) pairs"),
            }
        }
    }

    fn parameter(&mut self, items: &[Node]) -> Option<Parameter> {
        let head = items[0].token();
        let name = head.literal.clone();

        let Some(type_node) = items.get(1) else {
            self.error(head, format!("parameter '{name}' is missing a type"));
            return None;
        };
        if self.reject_illegal(type_node) {
            return None;
        }

        let mut param = match type_node {
            Node::Leaf(token) if token.kind == TokenKind::Identifier => {
                let ty = ParamType::parse(&token.literal);
                let mut param = Parameter::new(name.clone(), ty);
                if param.ty == ParamType::Enum {
                    param.constraints = enum_values(&items[2..]);
                }
                param
            }
            Node::Leaf(token) => {
                self.error(
                    token,
                    format!("invalid type {} for parameter '{name}'", token.kind),
                );
                return None;
            }
            Node::List { .. } if type_node.head_identifier() == Some("enum") => {
                let mut param = Parameter::new(name.clone(), ParamType::Enum);
                param.constraints = enum_values(&type_node.children()[1..]);
                param
            }
            Node::List { open, .. } => {
                self.error(
                    open,
                    format!("parameter '{name}' has a list type other than 'enum'"),
                );
                return None;
            }
        };

        for extra in &items[2..] {
            if self.reject_illegal(extra) {
                continue;
            }
            let Some(key) = extra.head_identifier() else {
                continue;
            };
            let value = extra.children().get(1);
            match key {
                "desc" => {
                    if let Some(token) = string_leaf(value) {
                        param.description = Some(token.literal.clone());
                        param.metadata.insert("desc".to_string(), token.literal.clone());
                    }
                }
                "default" => match value.and_then(Node::as_leaf).and_then(Literal::from_token) {
                    Some(literal) => param.default = Some(literal),
                    None => self.error(
                        extra.token(),
                        format!("default for parameter '{name}' must be a literal"),
                    ),
                },
                _ => {
                    if let Some(literal) = value.and_then(Node::as_leaf).and_then(Literal::from_token)
                    {
                        param
                            .metadata
                            .insert(key.to_string(), literal.text().to_string());
                    }
                }
            }
        }

        if param.ty == ParamType::Enum && param.constraints.is_empty() {
            self.error(head, format!("enum parameter '{name}' has no values"));
            return None;
        }

        Some(param)
    }

    fn implementation(&mut self, kind: ImplementationKind, fields: &[Node]) -> ImplementationBlock {
        let mut block = ImplementationBlock::new(kind);

        for field in fields {
            if field.as_leaf().is_some() {
                self.reject_illegal(field);
                continue;
            }
            let items = field.children();
            let Some(head) = items.first() else {
                continue;
            };
            if self.reject_illegal(head) {
                continue;
            }
            let Some(field_name) = field.head_identifier() else {
                self.error(
                    head.token(),
                    format!(
                        "unexpected token {} in implementation block",
                        head.token().kind
                    ),
                );
                continue;
            };

            let value = match field_name {
                "image" | "command" => {
                    let Some(token) = items
                        .get(1)
                        .and_then(Node::as_leaf)
                        .filter(|token| token.is_text())
                    else {
                        continue;
                    };
                    match Literal::from_token(token) {
                        Some(literal) => FieldValue::Scalar(literal),
                        None => continue,
                    }
                }
                "volumes" | "env" => FieldValue::Pairs(self.pairs(&items[1..])),
                "arguments" => {
                    let mut arguments = Vec::new();
                    for arg in &items[1..] {
                        if self.reject_illegal(arg) {
                            continue;
                        }
                        match arg.as_leaf().and_then(Literal::from_token) {
                            Some(literal) => arguments.push(literal),
                            None => self.error(
                                arg.token(),
                                "arguments must be literals or parameter names",
                            ),
                        }
                    }
                    FieldValue::List(arguments)
                }
                _ => match items.get(1).and_then(Node::as_leaf).and_then(Literal::from_token) {
                    Some(literal) => FieldValue::Scalar(literal),
                    None => FieldValue::Empty,
                },
            };
            block.fields.insert(field_name.to_string(), value);
        }

        block
    }

    fn pairs(&mut self, entries: &[Node]) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for entry in entries {
            if self.reject_illegal(entry) {
                continue;
            }
            let mut words = Vec::new();
            for group in glued(entry.children()) {
                if let [token] = group.as_slice() {
                    if token.kind == TokenKind::Illegal {
                        self.error(token, format!("unexpected character '{}'", token.literal));
                        continue;
                    }
                }
                words.push(join(&group));
            }
            let mut words = words.into_iter();
            if let (Some(key), Some(value)) = (words.next(), words.next()) {
                pairs.push((key, value));
            }
        }
        pairs
    }

    fn output(&mut self, entry: &Node) -> Option<OutputBlock> {
        if entry.as_leaf().is_some() {
            self.reject_illegal(entry);
            return None;
        }

        let description = entry
            .children()
            .iter()
            .filter(|item| item.head_identifier() == Some("desc"))
            .find_map(|item| item.children().get(1).and_then(Node::as_leaf))
            .filter(|token| token.is_text())
            .map(|token| token.literal.clone());

        let mut words = glued(entry.children()).into_iter().map(|group| join(&group));
        match (words.next(), words.next()) {
            (Some(name), Some(format)) => Some(OutputBlock {
                name,
                format,
                path: words.next(),
                description,
            }),
            _ => {
                self.error(entry.token(), "output entries need a name and a format");
                None
            }
        }
    }
}

/// Group the leaves of `items` into words. Tokens with no whitespace between
/// them form one word, so `output.txt` and `./out/file.txt` read as single
/// words. Nested lists separate words and are otherwise skipped.
fn glued(items: &[Node]) -> Vec<Vec<&Token>> {
    let mut groups: Vec<Vec<&Token>> = Vec::new();
    let mut previous_end = None;
    for item in items {
        match item {
            Node::Leaf(token) => {
                match (previous_end, groups.last_mut()) {
                    (Some(end), Some(group)) if end == token.start => group.push(token),
                    _ => groups.push(vec![token]),
                }
                previous_end = Some(token.end);
            }
            Node::List { .. } => previous_end = None,
        }
    }
    groups
}

fn join(group: &[&Token]) -> String {
    group.iter().map(|token| token.literal.as_str()).collect()
}

fn string_leaf(node: Option<&Node>) -> Option<&Token> {
    node.and_then(Node::as_leaf)
        .filter(|token| token.kind == TokenKind::String)
}

/// Collect enum values from string and character leaves, directly or one
/// list level down. Lists headed by an identifier are annotations, not values.
fn enum_values(nodes: &[Node]) -> Vec<String> {
    let mut values = Vec::new();
    for node in nodes {
        match node {
            Node::Leaf(token) if token.is_text() => values.push(token.literal.clone()),
            Node::Leaf(_) => {}
            Node::List { .. } if node.head_identifier().is_some() => {}
            Node::List { children, .. } => values.extend(
                children
                    .iter()
                    .filter_map(Node::as_leaf)
                    .filter(|token| token.is_text())
                    .map(|token| token.literal.clone()),
            ),
        }
    }
    values
}
