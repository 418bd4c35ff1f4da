//! Abstract syntax tree of a human-readable query.

use std::fmt;

use crate::token::{Number, Span};

/// A node of the query tree. The root of every parsed query is a `Node`.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Leaf comparison, e.g. `age >= 21`
    Comparison {
        field: FieldPath,
        op: CompOp,
        value: Literal,
        /// Covers the whole comparison in the source.
        span: Span,
    },
    /// n-ary `AND` / `OR`, operands in source order
    Logical { op: LogicalOp, operands: Vec<Node> },
    /// Prefix `NOT`
    Not(Box<Node>),
    /// Parenthesised sub-expression; transparent to the emitter
    Group(Box<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Dotted field path, e.g. `address.city`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(pub Vec<String>);

impl FieldPath {
    pub fn parse(dotted: &str) -> Self {
        FieldPath(dotted.split('.').map(str::to_string).collect())
    }

    /// The key used in the filter document.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,     // =
    Ne,     // !=
    Gt,     // >
    Gte,    // >=
    Lt,     // <
    Lte,    // <=
    In,     // IN
    NotIn,  // NOT IN
    Regex,  // ~
    Exists, // EXISTS / NOT EXISTS, operand is a boolean
}

impl CompOp {
    /// Source spelling, used in diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            CompOp::Eq => "=",
            CompOp::Ne => "!=",
            CompOp::Gt => ">",
            CompOp::Gte => ">=",
            CompOp::Lt => "<",
            CompOp::Lte => "<=",
            CompOp::In => "IN",
            CompOp::NotIn => "NOT IN",
            CompOp::Regex => "~",
            CompOp::Exists => "EXISTS",
        }
    }
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
    Array(Vec<Literal>),
    /// Raw text of `date("...")` and the span of the whole call, decoded by the reviver.
    Date(String, Span),
    /// Raw text of `oid("...")` and the span of the whole call.
    Id(String, Span),
}

impl Literal {
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::String(_) => "a string",
            Literal::Number(_) => "a number",
            Literal::Bool(_) => "a boolean",
            Literal::Null => "null",
            Literal::Array(_) => "an array",
            Literal::Date(..) => "a date",
            Literal::Id(..) => "an ObjectId",
        }
    }
}
