use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::lexer::{Token, TokenKind};

/// Implementation kind that runs the program inside a Docker container.
pub const RUN_DOCKER: &str = "run_docker";

/// Typed program model produced by the parser.
///
/// Parameters, implementation blocks and outputs keep their source order so
/// that generated code is reproducible.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    /// Program identifier (second element of the `bala` form).
    pub name: String,
    /// Text of the `(desc "...")` form, if any.
    pub description: Option<String>,
    /// Declared parameters.
    pub parameters: Vec<Parameter>,
    /// Implementation blocks such as `run_docker`.
    pub implementations: Vec<ImplementationBlock>,
    /// Program-level metadata; later keys overwrite earlier ones.
    pub metadata: BTreeMap<String, String>,
    /// Declared outputs.
    pub outputs: Vec<OutputBlock>,
}

impl Program {
    /// Create an empty program with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Look up a parameter by name. With duplicate names the last one wins.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().rev().find(|param| param.name == name)
    }

    /// Parameters typed `file` or `directory`, in declaration order.
    pub fn path_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|param| param.ty.is_path())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Program: {}", self.name)?;
        if let Some(description) = &self.description {
            writeln!(f, "\tDescription: {description}")?;
        }
        if !self.metadata.is_empty() {
            writeln!(f, "\tMetadata:")?;
            for (key, value) in &self.metadata {
                writeln!(f, "\t\t{key}: {value}")?;
            }
        }
        if !self.parameters.is_empty() {
            writeln!(f, "\tParameters:")?;
            for param in &self.parameters {
                write!(f, "{param}")?;
            }
        }
        if !self.implementations.is_empty() {
            writeln!(f, "\tImplementations:")?;
            for block in &self.implementations {
                write!(f, "{block}")?;
            }
        }
        if !self.outputs.is_empty() {
            writeln!(f, "\tOutputs:")?;
            for output in &self.outputs {
                write!(f, "{output}")?;
            }
        }
        Ok(())
    }
}

/// Declared type of a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParamType {
    /// Free text.
    String,
    /// Integer or floating-point number.
    Number,
    /// Whole number.
    Integer,
    /// True/false switch.
    Boolean,
    /// Path to an existing file.
    File,
    /// Path to an existing directory.
    Directory,
    /// Exactly one character.
    Character,
    /// One of a fixed list of strings.
    Enum,
    /// Any other type name, passed through untouched.
    Other(String),
}

impl ParamType {
    /// Every built-in type, in a stable order.
    pub const BUILTIN: [ParamType; 8] = [
        ParamType::String,
        ParamType::Number,
        ParamType::Integer,
        ParamType::Boolean,
        ParamType::File,
        ParamType::Directory,
        ParamType::Character,
        ParamType::Enum,
    ];

    /// Map a type name to a type.
    pub fn parse(name: &str) -> Self {
        match name {
            "string" => ParamType::String,
            "number" => ParamType::Number,
            "integer" => ParamType::Integer,
            "boolean" => ParamType::Boolean,
            "file" => ParamType::File,
            "directory" => ParamType::Directory,
            "character" => ParamType::Character,
            "enum" => ParamType::Enum,
            other => ParamType::Other(other.to_string()),
        }
    }

    /// The source spelling of the type.
    pub fn as_str(&self) -> &str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::File => "file",
            ParamType::Directory => "directory",
            ParamType::Character => "character",
            ParamType::Enum => "enum",
            ParamType::Other(name) => name,
        }
    }

    /// `file` or `directory`.
    pub fn is_path(&self) -> bool {
        matches!(self, ParamType::File | ParamType::Directory)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ParamType {
    fn from(name: String) -> Self {
        ParamType::parse(&name)
    }
}

impl From<ParamType> for String {
    fn from(ty: ParamType) -> Self {
        ty.as_str().to_string()
    }
}

/// A literal value as written in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Literal {
    /// Double-quoted string (without quotes).
    Str(String),
    /// Single-quoted literal (without quotes).
    Char(String),
    /// Number, kept as written.
    Number(String),
    /// Bare identifier. Inside `arguments` it names a parameter to substitute.
    Symbol(String),
}

impl Literal {
    /// Convert a leaf token into a literal. Parentheses, comments, EOF and
    /// illegal characters have no literal form.
    pub fn from_token(token: &Token) -> Option<Self> {
        let text = token.literal.clone();
        match token.kind {
            TokenKind::String => Some(Literal::Str(text)),
            TokenKind::Character => Some(Literal::Char(text)),
            TokenKind::Number => Some(Literal::Number(text)),
            TokenKind::Identifier => Some(Literal::Symbol(text)),
            _ => None,
        }
    }

    /// The literal's text, without quotes.
    pub fn text(&self) -> &str {
        match self {
            Literal::Str(text)
            | Literal::Char(text)
            | Literal::Number(text)
            | Literal::Symbol(text) => text,
        }
    }

    /// The identifier of a bare symbol.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Literal::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Interpret the literal as a boolean (`true`/`false`, any quoting).
    pub fn as_bool(&self) -> Option<bool> {
        match self.text() {
            "true" | "TRUE" | "True" => Some(true),
            "false" | "FALSE" | "False" => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(text) => write!(f, "\"{text}\""),
            Literal::Char(text) => write!(f, "'{text}'"),
            Literal::Number(text) | Literal::Symbol(text) => f.write_str(text),
        }
    }
}

/// A declared program parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter identifier.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// Allowed values; only populated for enum parameters.
    pub constraints: Vec<String>,
    /// Value used when the caller supplies none.
    pub default: Option<Literal>,
    /// Text of the `(desc "...")` form.
    pub description: Option<String>,
    /// Other `(key value)` annotations, e.g. `galaxy_data_table`.
    pub metadata: BTreeMap<String, String>,
}

impl Parameter {
    /// Create a parameter with no constraints, default or metadata.
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            constraints: Vec::new(),
            default: None,
            description: None,
            metadata: BTreeMap::new(),
        }
    }

    /// The description, or a generic one naming the type.
    pub fn help_text(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => format!("Parameter of type '{}'", self.ty),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\t\tParam: {}", self.name)?;
        writeln!(f, "\t\t\tType: {}", self.ty)?;
        if !self.constraints.is_empty() {
            writeln!(f, "\t\t\tConstraints: [{}]", self.constraints.join(", "))?;
        }
        if let Some(default) = &self.default {
            writeln!(f, "\t\t\tDefault: {default}")?;
        }
        if let Some(description) = &self.description {
            writeln!(f, "\t\t\tDescription: {description}")?;
        }
        if !self.metadata.is_empty() {
            writeln!(f, "\t\t\tMetadata:")?;
            for (key, value) in &self.metadata {
                writeln!(f, "\t\t\t\t{key}: {value}")?;
            }
        }
        Ok(())
    }
}

/// Kind of an implementation block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImplementationKind {
    /// `run_docker`: execute inside a container.
    RunDocker,
    /// Any other kind; backends need a registered handler for it.
    Other(String),
}

impl ImplementationKind {
    /// Map a block name to a kind.
    pub fn parse(name: &str) -> Self {
        match name {
            RUN_DOCKER => ImplementationKind::RunDocker,
            other => ImplementationKind::Other(other.to_string()),
        }
    }

    /// The source spelling of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            ImplementationKind::RunDocker => RUN_DOCKER,
            ImplementationKind::Other(name) => name,
        }
    }
}

impl fmt::Display for ImplementationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ImplementationKind {
    fn from(name: String) -> Self {
        ImplementationKind::parse(&name)
    }
}

impl From<ImplementationKind> for String {
    fn from(kind: ImplementationKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Value of one implementation-block field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    /// A single literal (`image`, `command`, unknown fields).
    Scalar(Literal),
    /// Ordered literals (`arguments`).
    List(Vec<Literal>),
    /// Ordered key/value pairs (`volumes`, `env`).
    Pairs(Vec<(String, String)>),
    /// A field named without a value.
    Empty,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Scalar(literal) => write!(f, "{literal}"),
            FieldValue::List(items) => {
                let items: Vec<String> = items.iter().map(Literal::to_string).collect();
                write!(f, "[{}]", items.join(" "))
            }
            FieldValue::Pairs(pairs) => {
                let pairs: Vec<String> = pairs.iter().map(|(k, v)| format!("{k} -> {v}")).collect();
                write!(f, "[{}]", pairs.join(", "))
            }
            FieldValue::Empty => f.write_str("<empty>"),
        }
    }
}

/// An implementation block such as `(run_docker (image "...") ...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationBlock {
    /// Block kind.
    pub kind: ImplementationKind,
    /// Fields by name. Unknown fields are kept for backends to interpret.
    pub fields: BTreeMap<String, FieldValue>,
}

impl ImplementationBlock {
    /// Create a block with no fields.
    pub fn new(kind: ImplementationKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Text of a scalar field.
    pub fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(FieldValue::Scalar(literal)) => Some(literal.text()),
            _ => None,
        }
    }

    /// Items of a list field; empty when absent.
    pub fn list(&self, field: &str) -> &[Literal] {
        match self.fields.get(field) {
            Some(FieldValue::List(items)) => items,
            _ => &[],
        }
    }

    /// Pairs of a pair-list field; empty when absent.
    pub fn pairs(&self, field: &str) -> &[(String, String)] {
        match self.fields.get(field) {
            Some(FieldValue::Pairs(pairs)) => pairs,
            _ => &[],
        }
    }
}

impl fmt::Display for ImplementationBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\t\tBlock: {}", self.kind)?;
        if !self.fields.is_empty() {
            writeln!(f, "\t\t\tFields:")?;
            for (name, value) in &self.fields {
                writeln!(f, "\t\t\t\t{name}: {value}")?;
            }
        }
        Ok(())
    }
}

/// A declared program output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBlock {
    /// Output name, e.g. `output.txt`.
    pub name: String,
    /// Format tag, e.g. `txt` or `tabular`.
    pub format: String,
    /// Location or label of the produced file.
    pub path: Option<String>,
    /// Text of a nested `(desc "...")` form.
    pub description: Option<String>,
}

impl OutputBlock {
    /// Human-readable label: the description, then the path, then the name.
    pub fn label(&self) -> &str {
        self.description
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or(&self.name)
    }
}

impl fmt::Display for OutputBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\t\tOutput: {}", self.name)?;
        writeln!(f, "\t\t\tFormat: {}", self.format)?;
        if let Some(path) = &self.path {
            writeln!(f, "\t\t\tPath: {path}")?;
        }
        if let Some(description) = &self.description {
            writeln!(f, "\t\t\tDescription: {description}")?;
        }
        Ok(())
    }
}
