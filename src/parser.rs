//! Parser for human-readable queries.
//!
//! ## Call graph
//!
//! ```text
//! parse()
//!   └─ parse_or_expression()
//!        ├─ parse_and_expression()
//!        │    ├─ parse_not_expression()
//!        │    │    ├─ "NOT" → parse_not_expression() (chained NOT allowed)
//!        │    │    └─ parse_primary_expression()
//!        │    │         ├─ "(" → grouped expression (recurses into parse_or_expression)
//!        │    │         └─ field path → parse_comparison()
//!        │    │                          ├─ op literal        (= != > >= < <= ~)
//!        │    │                          ├─ [NOT] IN literal
//!        │    │                          └─ [NOT] EXISTS
//!        │    │
//!        │    └─ on AND, parse another NOT expression
//!        │
//!        └─ on OR, parse another AND expression
//! ```
//!
//! ## Precedence (high to low)
//!
//! 1. **Grouping** `(expression)`
//! 2. **Comparison** `age >= 21`, `tags IN ["a", "b"]`, `email EXISTS`
//! 3. **NOT** `NOT expression`
//! 4. **AND** `expr AND expr`
//! 5. **OR** `expr OR expr`
//!
//! So `a = 1 OR b = 2 AND c = 3` reads as `a = 1 OR (b = 2 AND c = 3)`.
//!
//! ## Literals
//!
//! - **String**: `"double"` or `'single'` quoted
//! - **Number**: `12`, `-4`, `2.5`, `1e6`
//! - **Boolean / null**: `true`, `false`, `null`
//! - **Array**: `[1, "two", date("2020-01-01")]`
//! - **Date**: `date("2015-01-01T00:00:00Z")` or `ISODate("...")`
//! - **ObjectId**: `oid("507f1f77bcf86cd799439011")` or `ObjectId("...")`
//!
//! The parser does no semantic checks; `qty IN 5` parses and is rejected by the
//! emitter.

use crate::ast::{CompOp, FieldPath, Literal, LogicalOp, Node};
use crate::error::ParseError;
use crate::token::{Span, Token, TokenKind};

/// Nesting allowed for parentheses, `NOT` and arrays unless configured otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 64;

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    /// Stands in for a missing trailing `Eof` token.
    eof: Token<'a>,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
        Self {
            tokens,
            position: 0,
            eof: Token {
                kind: TokenKind::Eof,
                span: Span::point(end),
            },
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the current token without advancing.
    fn peek(&self) -> &Token<'a> {
        self.tokens.get(self.position).unwrap_or(&self.eof)
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> Token<'a> {
        let token = self.peek().clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    /// End offset of the last consumed token.
    fn previous_end(&self) -> usize {
        self.position
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.end)
            .unwrap_or(0)
    }

    /// Checks whether the current token has the given kind.
    fn match_token(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    /// Consumes a token of the given kind, or fails describing `expected`.
    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token<'a>, ParseError> {
        if self.match_token(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Builds a syntax error at the current token.
    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::Syntax {
            span: token.span,
            expected: expected.to_string(),
            found: token.kind.describe(),
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::LimitExceeded {
                span: self.peek().span,
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Parses the whole token stream into a single expression.
    pub fn parse(&mut self) -> Result<Node, ParseError> {
        if self.match_token(&TokenKind::Eof) {
            return Err(self.unexpected("expression"));
        }
        let node = self.parse_or_expression()?;
        if !self.match_token(&TokenKind::Eof) {
            return Err(self.unexpected("`AND`, `OR` or end of input"));
        }
        Ok(node)
    }

    /// `and_expr (OR and_expr)*`
    fn parse_or_expression(&mut self) -> Result<Node, ParseError> {
        let mut operands = vec![self.parse_and_expression()?];

        while self.match_token(&TokenKind::Or) {
            self.advance();
            operands.push(self.parse_and_expression()?);
        }

        Ok(logical(LogicalOp::Or, operands))
    }

    /// `not_expr (AND not_expr)*`
    fn parse_and_expression(&mut self) -> Result<Node, ParseError> {
        let mut operands = vec![self.parse_not_expression()?];

        while self.match_token(&TokenKind::And) {
            self.advance();
            operands.push(self.parse_not_expression()?);
        }

        Ok(logical(LogicalOp::And, operands))
    }

    /// `NOT* primary_expr`
    fn parse_not_expression(&mut self) -> Result<Node, ParseError> {
        if self.match_token(&TokenKind::Not) {
            self.advance();
            self.enter()?;
            let expr = self.parse_not_expression()?;
            self.leave();
            Ok(Node::Not(Box::new(expr)))
        } else {
            self.parse_primary_expression()
        }
    }

    fn parse_primary_expression(&mut self) -> Result<Node, ParseError> {
        match &self.peek().kind {
            TokenKind::LParen => {
                self.advance();
                self.enter()?;
                let expr = self.parse_or_expression()?;
                self.expect(TokenKind::RParen, "`)`")?;
                self.leave();
                Ok(Node::Group(Box::new(expr)))
            }
            TokenKind::Identifier(_) => self.parse_comparison(),
            _ => Err(self.unexpected("field name, `NOT` or `(`")),
        }
    }

    /// `path op literal`, `path [NOT] IN literal` or `path [NOT] EXISTS`
    fn parse_comparison(&mut self) -> Result<Node, ParseError> {
        let field_token = self.advance();
        let TokenKind::Identifier(name) = field_token.kind else {
            return Err(ParseError::Syntax {
                span: field_token.span,
                expected: "field name".to_string(),
                found: field_token.kind.describe(),
            });
        };
        let field = FieldPath::parse(name);

        let (op, value) = match &self.peek().kind {
            TokenKind::Exists => {
                self.advance();
                (CompOp::Exists, Literal::Bool(true))
            }
            TokenKind::In => {
                self.advance();
                (CompOp::In, self.parse_literal()?)
            }
            TokenKind::Not => {
                self.advance();
                match &self.peek().kind {
                    TokenKind::In => {
                        self.advance();
                        (CompOp::NotIn, self.parse_literal()?)
                    }
                    TokenKind::Exists => {
                        self.advance();
                        (CompOp::Exists, Literal::Bool(false))
                    }
                    _ => return Err(self.unexpected("`IN` or `EXISTS` after `NOT`")),
                }
            }
            _ => {
                let op = self.parse_comparison_operator()?;
                (op, self.parse_literal()?)
            }
        };

        Ok(Node::Comparison {
            field,
            op,
            value,
            span: Span::new(field_token.span.start, self.previous_end()),
        })
    }

    fn parse_comparison_operator(&mut self) -> Result<CompOp, ParseError> {
        let op = match &self.peek().kind {
            TokenKind::Eq => CompOp::Eq,
            TokenKind::NotEq => CompOp::Ne,
            TokenKind::Gt => CompOp::Gt,
            TokenKind::Gte => CompOp::Gte,
            TokenKind::Lt => CompOp::Lt,
            TokenKind::Lte => CompOp::Lte,
            TokenKind::Match => CompOp::Regex,
            _ => return Err(self.unexpected("comparison operator")),
        };
        self.advance();
        Ok(op)
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        let span = self.peek().span;
        let literal = match &self.peek().kind {
            TokenKind::String(s) => Literal::String(s.clone()),
            TokenKind::Number(n) => Literal::Number(*n),
            TokenKind::Boolean(b) => Literal::Bool(*b),
            TokenKind::Null => Literal::Null,
            TokenKind::DateMarker(raw) => Literal::Date(raw.clone(), span),
            TokenKind::IdMarker(raw) => Literal::Id(raw.clone(), span),
            TokenKind::LBracket => return self.parse_array(),
            _ => return Err(self.unexpected("literal value")),
        };
        self.advance();
        Ok(literal)
    }

    /// `[ literal (, literal)* ]`, trailing comma not allowed
    fn parse_array(&mut self) -> Result<Literal, ParseError> {
        self.expect(TokenKind::LBracket, "`[`")?;
        self.enter()?;
        let mut values = Vec::new();

        if !self.match_token(&TokenKind::RBracket) {
            loop {
                values.push(self.parse_literal()?);
                if self.match_token(&TokenKind::RBracket) {
                    break;
                }
                self.expect(TokenKind::Comma, "`,` or `]`")?;
            }
        }

        self.expect(TokenKind::RBracket, "`]`")?;
        self.leave();
        Ok(Literal::Array(values))
    }
}

/// Collapses a single-operand chain to the operand itself.
fn logical(op: LogicalOp, mut operands: Vec<Node>) -> Node {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        Node::Logical { op, operands }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::token::Number;

    fn parse_string(input: &str) -> Result<Node, ParseError> {
        let tokens = tokenize(input).unwrap();
        Parser::new(&tokens).parse()
    }

    fn field(node: &Node) -> String {
        match node {
            Node::Comparison { field, .. } => field.dotted(),
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_comparison() {
        let result = parse_string(r#"status = "Open""#).unwrap();

        if let Node::Comparison { field, op, value, span } = result {
            assert_eq!(field, FieldPath(vec!["status".to_string()]));
            assert_eq!(op, CompOp::Eq);
            assert_eq!(value, Literal::String("Open".to_string()));
            assert_eq!(span, Span::new(0, 15));
        } else {
            panic!("Expected comparison");
        }
    }

    #[test]
    fn test_all_comparison_operators() {
        let cases = [
            ("a = 1", CompOp::Eq),
            ("a != 1", CompOp::Ne),
            ("a > 1", CompOp::Gt),
            ("a >= 1", CompOp::Gte),
            ("a < 1", CompOp::Lt),
            ("a <= 1", CompOp::Lte),
            ("a ~ \"x\"", CompOp::Regex),
            ("a IN [1]", CompOp::In),
            ("a NOT IN [1]", CompOp::NotIn),
            ("a EXISTS", CompOp::Exists),
        ];
        for (input, expected) in cases {
            match parse_string(input).unwrap() {
                Node::Comparison { op, .. } => assert_eq!(op, expected, "{}", input),
                other => panic!("Expected comparison for {}, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_exists_operand() {
        let Node::Comparison { value, .. } = parse_string("email NOT EXISTS").unwrap() else {
            panic!("Expected comparison");
        };
        assert_eq!(value, Literal::Bool(false));
    }

    #[test]
    fn test_dotted_field_path() {
        let Node::Comparison { field, .. } = parse_string("address.geo.lat > 1.5").unwrap() else {
            panic!("Expected comparison");
        };
        assert_eq!(field.0, vec!["address", "geo", "lat"]);
    }

    #[test]
    fn test_or_binds_looser_than_and() {
        let result = parse_string("a = 1 OR b = 2 AND c = 3").unwrap();

        let Node::Logical { op: LogicalOp::Or, operands } = result else {
            panic!("Expected OR at the root");
        };
        assert_eq!(operands.len(), 2);
        assert_eq!(field(&operands[0]), "a");
        let Node::Logical { op: LogicalOp::And, operands: inner } = &operands[1] else {
            panic!("Expected AND on the right of OR");
        };
        assert_eq!(field(&inner[0]), "b");
        assert_eq!(field(&inner[1]), "c");
    }

    #[test]
    fn test_grouping_overrides_precedence() {
        let result = parse_string("(a = 1 OR b = 2) AND c = 3").unwrap();

        let Node::Logical { op: LogicalOp::And, operands } = result else {
            panic!("Expected AND at the root");
        };
        let Node::Group(inner) = &operands[0] else {
            panic!("Expected group on the left of AND");
        };
        assert!(matches!(inner.as_ref(), Node::Logical { op: LogicalOp::Or, .. }));
        assert_eq!(field(&operands[1]), "c");
    }

    #[test]
    fn test_chains_are_flat() {
        let result = parse_string("a = 1 OR b = 2 OR c = 3").unwrap();
        let Node::Logical { op: LogicalOp::Or, operands } = result else {
            panic!("Expected OR");
        };
        assert_eq!(operands.len(), 3);
    }

    #[test]
    fn test_not_binds_tighter_than_and() {
        let result = parse_string("NOT a = 1 AND b = 2").unwrap();
        let Node::Logical { op: LogicalOp::And, operands } = result else {
            panic!("Expected AND");
        };
        assert!(matches!(operands[0], Node::Not(_)));
        assert_eq!(field(&operands[1]), "b");
    }

    #[test]
    fn test_double_not() {
        let result = parse_string("NOT NOT a = 1").unwrap();
        let Node::Not(inner) = result else {
            panic!("Expected NOT");
        };
        assert!(matches!(inner.as_ref(), Node::Not(_)));
    }

    #[test]
    fn test_literals() {
        let result = parse_string(
            r#"x IN ["s", 2, 2.5, true, null, date("2020-01-01"), oid("507f1f77bcf86cd799439011"), []]"#,
        )
        .unwrap();
        let Node::Comparison { value, .. } = result else {
            panic!("Expected comparison");
        };
        assert_eq!(
            value,
            Literal::Array(vec![
                Literal::String("s".to_string()),
                Literal::Number(Number::Int(2)),
                Literal::Number(Number::Float(2.5)),
                Literal::Bool(true),
                Literal::Null,
                Literal::Date("2020-01-01".to_string(), Span::new(31, 49)),
                Literal::Id("507f1f77bcf86cd799439011".to_string(), Span::new(51, 82)),
                Literal::Array(vec![]),
            ])
        );
    }

    #[test]
    fn test_in_accepts_non_array_literal() {
        let Node::Comparison { op, value, .. } = parse_string("qty IN 5").unwrap() else {
            panic!("Expected comparison");
        };
        assert_eq!(op, CompOp::In);
        assert_eq!(value, Literal::Number(Number::Int(5)));
    }

    #[test]
    fn test_empty_input_is_error() {
        assert_eq!(
            parse_string("   ").unwrap_err(),
            ParseError::Syntax {
                span: Span::point(3),
                expected: "expression".to_string(),
                found: "end of input".to_string(),
            }
        );
        assert!(Parser::new(&[]).parse().is_err());
    }

    #[test]
    fn test_missing_operand() {
        assert_eq!(
            parse_string("a = 1 AND").unwrap_err(),
            ParseError::Syntax {
                span: Span::point(9),
                expected: "field name, `NOT` or `(`".to_string(),
                found: "end of input".to_string(),
            }
        );
        assert_eq!(
            parse_string("a =").unwrap_err(),
            ParseError::Syntax {
                span: Span::point(3),
                expected: "literal value".to_string(),
                found: "end of input".to_string(),
            }
        );
    }

    #[test]
    fn test_unbalanced_parentheses() {
        assert_eq!(
            parse_string("(a = 1").unwrap_err(),
            ParseError::Syntax {
                span: Span::point(6),
                expected: "`)`".to_string(),
                found: "end of input".to_string(),
            }
        );
        assert_eq!(
            parse_string("a = 1)").unwrap_err(),
            ParseError::Syntax {
                span: Span::new(5, 6),
                expected: "`AND`, `OR` or end of input".to_string(),
                found: "`)`".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_operator() {
        let err = parse_string(r#"status "Open""#).unwrap_err();
        assert_eq!(
            err,
            ParseError::Syntax {
                span: Span::new(7, 13),
                expected: "comparison operator".to_string(),
                found: "string \"Open\"".to_string(),
            }
        );
    }

    #[test]
    fn test_unquoted_value_is_error() {
        let err = parse_string("status = Open").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { ref expected, .. } if expected == "literal value"));
    }

    #[test]
    fn test_not_without_in_or_exists() {
        let err = parse_string("a NOT = 1").unwrap_err();
        assert_eq!(err.span(), Span::new(6, 7));
    }

    #[test]
    fn test_array_trailing_comma_is_error() {
        assert!(parse_string(r#"status IN ["Open",]"#).is_err());
        assert!(parse_string(r#"status IN ["Open" "Closed"]"#).is_err());
    }

    #[test]
    fn test_error_position_is_independent_of_length() {
        let mut long = String::new();
        for i in 0..200 {
            long.push_str(&format!("f{} = {} AND ", i, i));
        }
        let offset = long.len();
        long.push_str("broken broken");

        let err = parse_string(&long).unwrap_err();
        assert_eq!(err.span(), Span::new(offset + 7, offset + 13));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}a = 1{}", "(".repeat(100), ")".repeat(100));
        let tokens = tokenize(&deep).unwrap();
        let err = Parser::new(&tokens).parse().unwrap_err();
        assert!(matches!(err, ParseError::LimitExceeded { limit: DEFAULT_MAX_DEPTH, .. }));

        let nots = format!("{}a = 1", "NOT ".repeat(10));
        let tokens = tokenize(&nots).unwrap();
        assert!(Parser::new(&tokens).with_max_depth(10).parse().is_ok());
        assert!(Parser::new(&tokens).with_max_depth(9).parse().is_err());

        let nested = format!("a IN {}1{}", "[".repeat(5), "]".repeat(5));
        let tokens = tokenize(&nested).unwrap();
        assert!(matches!(
            Parser::new(&tokens).with_max_depth(4).parse(),
            Err(ParseError::LimitExceeded { limit: 4, .. })
        ));
    }
}
