//! Error types shared by every compiler stage, plus diagnostic rendering.

use std::fmt;

use crate::token::Span;

/// Errors raised while tokenizing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character {ch:?} at offset {position}")]
    UnexpectedChar { position: usize, ch: char },

    #[error("unterminated string starting at offset {position}")]
    UnterminatedString { position: usize },

    #[error("invalid escape sequence `\\{ch}` at offset {position}")]
    InvalidEscape { position: usize, ch: char },

    #[error("invalid number `{text}` at offset {position}")]
    InvalidNumber { position: usize, text: String },

    #[error("malformed {name}(...) literal at offset {position}, expected a quoted string in parentheses")]
    MalformedMarker { position: usize, name: String },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { position, ch } => Span::new(*position, position + ch.len_utf8()),
            LexError::UnterminatedString { position } => Span::new(*position, position + 1),
            LexError::InvalidEscape { position, ch } => Span::new(*position, position + 1 + ch.len_utf8()),
            LexError::InvalidNumber { position, text } => Span::new(*position, position + text.len()),
            LexError::MalformedMarker { position, name } => Span::new(*position, position + name.len()),
        }
    }
}

/// Errors raised while parsing the token stream.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error at {span}: expected {expected}, found {found}")]
    Syntax {
        span: Span,
        expected: String,
        found: String,
    },

    #[error("expression nested deeper than {limit} levels at {span}")]
    LimitExceeded { span: Span, limit: usize },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Syntax { span, .. } | ParseError::LimitExceeded { span, .. } => *span,
        }
    }
}

/// An operator was applied to a literal of the wrong shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("operator `{op}` at {span} expects {expected}, found {found}")]
pub struct EmitError {
    pub span: Span,
    pub op: &'static str,
    pub expected: &'static str,
    pub found: &'static str,
}

/// What went wrong while reviving a typed literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralErrorKind {
    InvalidDate,
    InvalidId,
    UnsupportedMarker,
    InvalidJson,
}

impl fmt::Display for LiteralErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LiteralErrorKind::InvalidDate => "invalid date",
            LiteralErrorKind::InvalidId => "invalid ObjectId",
            LiteralErrorKind::UnsupportedMarker => "no decoder registered for marker",
            LiteralErrorKind::InvalidJson => "invalid JSON",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {raw:?}")]
pub struct LiteralError {
    pub kind: LiteralErrorKind,
    pub raw: String,
    /// Span of the literal in the query; `None` for JSON input.
    pub span: Option<Span>,
}

impl LiteralError {
    pub fn new(kind: LiteralErrorKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
            span: None,
        }
    }

    pub fn at(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }
}

/// Any failure of [`crate::compile`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error(transparent)]
    Literal(#[from] LiteralError),
}

impl CompileError {
    /// Source span of the failure, when the stage that raised it knows one.
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::Lex(e) => Some(e.span()),
            CompileError::Parse(e) => Some(e.span()),
            CompileError::Emit(e) => Some(e.span),
            CompileError::Literal(e) => e.span,
        }
    }
}

/// 1-based line and column (in characters) of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = source[line_start..offset].chars().count() + 1;
    (line, column)
}

/// Renders `err` against `source` with a caret under the offending text:
///
/// ```text
/// error: syntax error at 10..10: expected expression, found end of input
///  --> 1:11
///   |
/// 1 | a = 1 AND
///   |           ^
/// ```
pub fn render_diagnostic(source: &str, err: &CompileError) -> String {
    let mut out = format!("error: {}", err);
    let Some(span) = err.span() else {
        return out;
    };

    let (line, column) = line_col(source, span.start);
    let line_text = source.lines().nth(line - 1).unwrap_or("");
    let gutter = line.to_string().len();
    let line_start = source[..span.start.min(source.len())]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let line_end = line_start + line_text.len();
    let underline_end = span.end.clamp(span.start, line_end.max(span.start));
    let width = source
        .get(span.start..underline_end)
        .map(|s| s.chars().count())
        .unwrap_or(0)
        .max(1);

    out.push_str(&format!("\n{:>gutter$}--> {}:{}", " ", line, column, gutter = gutter + 1));
    out.push_str(&format!("\n{:>gutter$} |", "", gutter = gutter));
    out.push_str(&format!("\n{} | {}", line, line_text));
    out.push_str(&format!(
        "\n{:>gutter$} | {}{}",
        "",
        " ".repeat(column - 1),
        "^".repeat(width),
        gutter = gutter
    ));
    out
}
