//! Compiles human-readable queries into MongoDB filter documents.
//!
//! ```
//! let filter = hrq2mongoq::compile(r#"status = "A" AND qty < 30"#).unwrap();
//! assert_eq!(
//!     serde_json::to_string(&filter).unwrap(),
//!     r#"{"status":"A","qty":{"$lt":30}}"#
//! );
//! ```
//!
//! Pipeline: [`lexer`] → [`parser`] → [`emitter`] → [`reviver`].

pub mod ast;
pub mod config;
pub mod document;
pub mod emitter;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod reviver;
pub mod token;

use log::{debug, trace};

pub use bson::oid::ObjectId;
pub use config::{CompilerConfig, ConfigError};
pub use document::{to_bson, Document, MarkerEnvelope, MarkerKind, Value};
pub use error::{render_diagnostic, CompileError, EmitError, LexError, LiteralError, LiteralErrorKind, ParseError};
pub use reviver::Reviver;

use ast::Node;
use emitter::Emitter;
use parser::Parser;
use token::Token;

/// A configured compiler. Holds no per-call state; share it freely.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
    reviver: Reviver,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            reviver: Reviver::default(),
        }
    }

    /// Replaces the reviver, e.g. to register more typed literals.
    pub fn with_reviver(mut self, reviver: Reviver) -> Self {
        self.reviver = reviver;
        self
    }

    pub fn tokenize<'a>(&self, hrq: &'a str) -> Result<Vec<Token<'a>>, LexError> {
        lexer::tokenize(hrq)
    }

    pub fn parse(&self, hrq: &str) -> Result<Node, CompileError> {
        let tokens = self.tokenize(hrq)?;
        debug!("lexed {} tokens", tokens.len());
        let ast = Parser::new(&tokens).with_max_depth(self.config.max_depth).parse()?;
        trace!("ast: {:?}", ast);
        Ok(ast)
    }

    /// Compiles `hrq` into a typed filter document.
    pub fn compile(&self, hrq: &str) -> Result<Document, CompileError> {
        let ast = self.parse(hrq)?;
        let emitted = Emitter::with_options(self.config.emit_options()).emit(&ast)?;
        let filter = self.reviver.revive_document(emitted)?;
        debug!("compiled {:?} into {} top-level keys", hrq, filter.len());
        Ok(filter)
    }

    /// Compiles `hrq` straight into a MongoDB driver filter.
    pub fn compile_bson(&self, hrq: &str) -> Result<bson::Document, CompileError> {
        self.compile(hrq).map(to_bson)
    }
}

/// Compiles `hrq` with the default configuration.
pub fn compile(hrq: &str) -> Result<Document, CompileError> {
    Compiler::default().compile(hrq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compile_revives_typed_literals() {
        let filter = compile(r#"created >= date("2015-01-01") AND owner = oid("507f1f77bcf86cd799439011")"#).unwrap();

        let Value::Document(created) = &filter["created"] else {
            panic!("Expected operator document");
        };
        assert_eq!(
            created["$gte"],
            Value::Date(chrono::Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            filter["owner"],
            Value::ObjectId(ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap())
        );
        assert!(!document::has_markers(&filter));
    }

    #[test]
    fn test_compile_propagates_each_stage_error() {
        assert!(matches!(compile("a = 1 #"), Err(CompileError::Lex(_))));
        assert!(matches!(compile(""), Err(CompileError::Parse(_))));
        assert!(matches!(compile("a IN 1"), Err(CompileError::Emit(_))));
        assert!(matches!(
            compile(r#"a = date("soon")"#),
            Err(CompileError::Literal(LiteralError { kind: LiteralErrorKind::InvalidDate, .. }))
        ));
        assert!(matches!(
            compile(r#"a = oid("zz")"#),
            Err(CompileError::Literal(LiteralError { kind: LiteralErrorKind::InvalidId, .. }))
        ));
    }

    #[test]
    fn test_literal_error_points_at_the_failing_literal() {
        let src = r#"note = "2015-13-01" AND d = date("2015-13-01")"#;
        let err = compile(src).unwrap_err();
        assert_eq!(err.span(), Some(token::Span::new(28, 46)));

        let rendered = render_diagnostic(src, &err);
        assert!(rendered.contains("--> 1:29"));
        assert!(rendered.ends_with(&format!("| {}{}", " ".repeat(28), "^".repeat(18))));
    }

    #[test]
    fn test_operator_names_cannot_be_injected() {
        for hrq in [r#"$where = "sleep(5000) || true""#, "$or = 1", "a.$gt = 1", "a = 1 OR $expr = 2"] {
            assert!(matches!(compile(hrq), Err(CompileError::Lex(LexError::UnexpectedChar { ch: '$', .. }))), "{}", hrq);
        }
    }

    #[test]
    fn test_compile_bson() {
        let filter = Compiler::default()
            .compile_bson(r#"created >= date("2015-01-01") AND _id IN [oid("507f1f77bcf86cd799439011")] AND n < 3"#)
            .unwrap();
        assert_eq!(
            filter,
            bson::doc! {
                "created": { "$gte": bson::DateTime::from_millis(1_420_070_400_000) },
                "_id": { "$in": [ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap()] },
                "n": { "$lt": 3_i64 },
            }
        );
    }

    #[test]
    fn test_config_is_applied() {
        let compiler = Compiler::new(CompilerConfig {
            max_depth: 2,
            merge_conjunctions: false,
        });
        assert!(matches!(
            compiler.compile("((((a = 1))))"),
            Err(CompileError::Parse(ParseError::LimitExceeded { limit: 2, .. }))
        ));
        let filter = compiler.compile("a = 1 AND b = 2").unwrap();
        assert_eq!(filter.keys().collect::<Vec<_>>(), vec!["$and"]);
    }

    #[test]
    fn test_dates_only_reviver() {
        let compiler = Compiler::default().with_reviver(Reviver::dates_only());
        assert!(compiler.compile(r#"d = date("2015-01-01")"#).is_ok());
        assert!(matches!(
            compiler.compile(r#"_id = oid("507f1f77bcf86cd799439011")"#),
            Err(CompileError::Literal(LiteralError { kind: LiteralErrorKind::UnsupportedMarker, .. }))
        ));
    }

    #[test]
    fn test_compiler_is_shareable_across_threads() {
        let compiler = std::sync::Arc::new(Compiler::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let compiler = std::sync::Arc::clone(&compiler);
                std::thread::spawn(move || {
                    let filter = compiler.compile(&format!("n = {}", i)).unwrap();
                    serde_json::to_string(&filter).unwrap()
                })
            })
            .collect();
        let outputs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(outputs, vec![r#"{"n":0}"#, r#"{"n":1}"#, r#"{"n":2}"#, r#"{"n":3}"#]);
    }
}
