//! Lexer for human-readable queries.

use crate::error::LexError;
use crate::token::{Number, Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// Current byte offset into `input`.
    position: usize,
    finished: bool,
}

/// Tokenizes `input`. The returned vector always ends with [`TokenKind::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(input).collect()
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            position: 0,
            finished: false,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// Advances one character and returns it.
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    fn read_digits(&mut self) -> usize {
        let mut count = 0;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    /// Reads a numeric literal. A leading `-`, if any, has already been consumed.
    fn read_number(&mut self, start: usize) -> Result<Token<'a>, LexError> {
        self.read_digits();
        let mut is_float = false;

        if self.peek() == Some('.') {
            self.bump();
            is_float = true;
            if self.read_digits() == 0 {
                return Err(self.invalid_number(start));
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            self.bump();
            is_float = true;
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            if self.read_digits() == 0 {
                return Err(self.invalid_number(start));
            }
        }
        // `12abc` is neither a number nor a field.
        if matches!(self.peek(), Some(c) if is_ident_char(c)) {
            while matches!(self.peek(), Some(c) if is_ident_char(c)) {
                self.bump();
            }
            return Err(self.invalid_number(start));
        }

        let text = &self.input[start..self.position];
        // Integers that overflow i64 degrade to doubles, as JSON would.
        let number = if is_float {
            text.parse::<f64>().ok().map(Number::Float)
        } else {
            text.parse::<i64>()
                .ok()
                .map(Number::Int)
                .or_else(|| text.parse::<f64>().ok().map(Number::Float))
        };
        match number {
            // Infinity has no JSON form.
            Some(Number::Float(f)) if !f.is_finite() => Err(self.invalid_number(start)),
            Some(n) => Ok(self.token(TokenKind::Number(n), start)),
            None => Err(self.invalid_number(start)),
        }
    }

    fn invalid_number(&self, start: usize) -> LexError {
        LexError::InvalidNumber {
            position: start,
            text: self.input[start..self.position].to_string(),
        }
    }

    /// Reads a quoted string and returns its unescaped contents.
    /// The opening quote has already been consumed.
    fn read_string(&mut self, start: usize, quote: char) -> Result<String, LexError> {
        let mut value = String::new();
        loop {
            let escape_at = self.position;
            match self.bump() {
                None => return Err(LexError::UnterminatedString { position: start }),
                Some(c) if c == quote => return Ok(value),
                Some('\\') => {
                    let Some(escaped) = self.bump() else {
                        return Err(LexError::UnterminatedString { position: start });
                    };
                    match escaped {
                        '\\' | '"' | '\'' | '/' => value.push(escaped),
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        'b' => value.push('\u{0008}'),
                        'f' => value.push('\u{000C}'),
                        'u' => value.push(self.read_unicode_escape(escape_at)?),
                        other => {
                            return Err(LexError::InvalidEscape {
                                position: escape_at,
                                ch: other,
                            })
                        }
                    }
                }
                Some(c) => value.push(c),
            }
        }
    }

    /// Reads the `XXXX` of `\uXXXX`, joining a UTF-16 surrogate pair
    /// written as two consecutive escapes.
    fn read_unicode_escape(&mut self, escape_at: usize) -> Result<char, LexError> {
        let invalid = LexError::InvalidEscape {
            position: escape_at,
            ch: 'u',
        };
        let high = self.read_hex4().ok_or(invalid.clone())?;
        let code = if (0xD800..0xDC00).contains(&high) {
            if !self.input[self.position..].starts_with("\\u") {
                return Err(invalid);
            }
            self.position += 2;
            let low = self
                .read_hex4()
                .filter(|low| (0xDC00..0xE000).contains(low))
                .ok_or(invalid.clone())?;
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        } else {
            high
        };
        char::from_u32(code).ok_or(invalid)
    }

    /// Exactly four ASCII hex digits.
    fn read_hex4(&mut self) -> Option<u32> {
        let hex = self
            .input
            .get(self.position..self.position + 4)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))?;
        let code = u32::from_str_radix(hex, 16).ok()?;
        self.position += 4;
        Some(code)
    }

    /// Reads a possibly dotted identifier (`a`, `a.b`, `items.0.sku`),
    /// a keyword, or a `name("...")` marker literal.
    fn read_identifier(&mut self, start: usize) -> Result<Token<'a>, LexError> {
        loop {
            while matches!(self.peek(), Some(c) if is_ident_char(c)) {
                self.bump();
            }
            if self.peek() != Some('.') {
                break;
            }
            let dot = self.position;
            self.bump();
            match self.peek() {
                Some(c) if is_ident_start(c) || c.is_ascii_digit() => continue,
                Some(c) => return Err(LexError::UnexpectedChar { position: self.position, ch: c }),
                None => return Err(LexError::UnexpectedChar { position: dot, ch: '.' }),
            }
        }
        let literal = &self.input[start..self.position];

        if let Some(marker) = marker_kind(literal) {
            let after_name = self.position;
            self.skip_whitespace();
            if self.peek() == Some('(') {
                return self.read_marker(start, literal, marker);
            }
            self.position = after_name;
        }

        let kind = match_keyword(literal);
        Ok(self.token(kind, start))
    }

    /// Reads `("raw")` following a marker name.
    fn read_marker(&mut self, start: usize, name: &str, marker: Marker) -> Result<Token<'a>, LexError> {
        let malformed = || LexError::MalformedMarker {
            position: start,
            name: name.to_string(),
        };
        self.bump(); // (
        self.skip_whitespace();
        let string_start = self.position;
        let raw = match self.bump() {
            Some(q @ ('"' | '\'')) => self.read_string(string_start, q)?,
            _ => return Err(malformed()),
        };
        self.skip_whitespace();
        if !self.bump_if(')') {
            return Err(malformed());
        }
        let kind = match marker {
            Marker::Date => TokenKind::DateMarker(raw),
            Marker::Id => TokenKind::IdMarker(raw),
        };
        Ok(self.token(kind, start))
    }

    fn next_token(&mut self) -> Result<Token<'a>, LexError> {
        let start = self.position;
        let Some(c) = self.bump() else {
            return Ok(self.token(TokenKind::Eof, start));
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '~' => TokenKind::Match,
            '=' => {
                self.bump_if('=');
                TokenKind::Eq
            }
            '<' => {
                if self.bump_if('=') {
                    TokenKind::Lte
                } else if self.bump_if('>') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.bump_if('=') {
                    TokenKind::Gte
                } else {
                    TokenKind::Gt
                }
            }
            '!' => {
                if self.bump_if('=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Not
                }
            }
            '&' if self.bump_if('&') => TokenKind::And,
            '|' if self.bump_if('|') => TokenKind::Or,
            '"' | '\'' => TokenKind::String(self.read_string(start, c)?),
            '-' if matches!(self.peek(), Some(d) if d.is_ascii_digit()) => return self.read_number(start),
            c if c.is_ascii_digit() => return self.read_number(start),
            c if is_ident_start(c) => return self.read_identifier(start),
            _ => return Err(LexError::UnexpectedChar { position: start, ch: c }),
        };
        Ok(self.token(kind, start))
    }
}

enum Marker {
    Date,
    Id,
}

fn marker_kind(name: &str) -> Option<Marker> {
    match name.to_ascii_lowercase().as_str() {
        "date" | "isodate" => Some(Marker::Date),
        "oid" | "objectid" => Some(Marker::Id),
        _ => None,
    }
}

/// Also the first character of every path segment. A leading `$` would
/// make the segment a query operator.
fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-'
}

fn match_keyword(s: &str) -> TokenKind<'_> {
    match s.to_ascii_lowercase().as_str() {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "exists" => TokenKind::Exists,
        "true" => TokenKind::Boolean(true),
        "false" => TokenKind::Boolean(false),
        "null" => TokenKind::Null,
        _ => TokenKind::Identifier(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.skip_whitespace();
        let token = self.next_token();
        if matches!(token, Err(_) | Ok(Token { kind: TokenKind::Eof, .. })) {
            self.finished = true;
        }
        Some(token)
    }
}
