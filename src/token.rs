//! The token definition for the query language.

use std::fmt;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords
    And,    // "AND", "&&"
    Or,     // "OR", "||"
    Not,    // "NOT", "!"
    In,     // "IN"
    Exists, // "EXISTS"

    // Identifiers, possibly dotted: `address.city`
    Identifier(&'a str),

    // Literals
    String(String), // unescaped contents, without quotes
    Number(Number),
    Boolean(bool),
    Null,
    DateMarker(String), // date("...") / ISODate("...")
    IdMarker(String),   // oid("...") / ObjectId("...")

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,

    // Operators
    Eq,    // =, ==
    NotEq, // !=, <>
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=
    Match, // ~

    Eof,
}

/// A numeric literal as written in the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{}", n),
            Number::Float(n) => write!(f, "{}", n),
        }
    }
}

impl TokenKind<'_> {
    /// Human readable description used in syntax errors.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::And => "`AND`".to_string(),
            TokenKind::Or => "`OR`".to_string(),
            TokenKind::Not => "`NOT`".to_string(),
            TokenKind::In => "`IN`".to_string(),
            TokenKind::Exists => "`EXISTS`".to_string(),
            TokenKind::Identifier(name) => format!("field `{}`", name),
            TokenKind::String(s) => format!("string {:?}", s),
            TokenKind::Number(n) => format!("number `{}`", n),
            TokenKind::Boolean(b) => format!("`{}`", b),
            TokenKind::Null => "`null`".to_string(),
            TokenKind::DateMarker(raw) => format!("date({:?})", raw),
            TokenKind::IdMarker(raw) => format!("oid({:?})", raw),
            TokenKind::LParen => "`(`".to_string(),
            TokenKind::RParen => "`)`".to_string(),
            TokenKind::LBracket => "`[`".to_string(),
            TokenKind::RBracket => "`]`".to_string(),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::Eq => "`=`".to_string(),
            TokenKind::NotEq => "`!=`".to_string(),
            TokenKind::Gt => "`>`".to_string(),
            TokenKind::Lt => "`<`".to_string(),
            TokenKind::Gte => "`>=`".to_string(),
            TokenKind::Lte => "`<=`".to_string(),
            TokenKind::Match => "`~`".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A zero-width span at `offset`.
    pub fn point(offset: usize) -> Self {
        Self { start: offset, end: offset }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
