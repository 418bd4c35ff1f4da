//! Emitter that turns a query AST into a MongoDB filter document.
//!
//! | HRQ                      | filter document                          |
//! |--------------------------|------------------------------------------|
//! | `a = 1`                  | `{"a": 1}`                               |
//! | `a > 1`                  | `{"a": {"$gt": 1}}`                      |
//! | `a IN [1, 2]`            | `{"a": {"$in": [1, 2]}}`                 |
//! | `a = 1 AND b = 2`        | `{"a": 1, "b": 2}`                       |
//! | `a > 1 AND a < 5`        | `{"$and": [{"a": {"$gt": 1}}, {"a": {"$lt": 5}}]}` |
//! | `a = 1 OR b = 2`         | `{"$or": [{"a": 1}, {"b": 2}]}`          |
//! | `NOT a = 1`              | `{"$nor": [{"a": 1}]}`                   |
//! | `d = date("2015-01-01")` | `{"d": {"$date": "2015-01-01"}}` (marker) |
//!
//! Date and ObjectId literals are left as marker envelopes for the reviver.

use std::collections::HashSet;

use crate::ast::{CompOp, Literal, LogicalOp, Node};
use crate::document::{Document, MarkerEnvelope, MarkerKind, Value};
use crate::error::EmitError;
use crate::token::{Number, Span};

#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Merge `AND` operands into one document when their keys do not collide,
    /// instead of emitting `$and`.
    pub merge_conjunctions: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            merge_conjunctions: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Emitter {
    options: EmitOptions,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EmitOptions) -> Self {
        Self { options }
    }

    pub fn emit(&self, node: &Node) -> Result<Document, EmitError> {
        match node {
            Node::Comparison { field, op, value, span } => {
                check_operand(*op, value, *span)?;
                let value = literal_to_value(value);
                let operand = match op {
                    CompOp::Eq => value,
                    other => Value::Document(single(operator_keyword(*other), value)),
                };
                Ok(single(&field.dotted(), operand))
            }
            Node::Logical { op: LogicalOp::And, operands } => self.emit_and(operands),
            Node::Logical { op: LogicalOp::Or, operands } => Ok(single("$or", self.emit_all(operands)?)),
            Node::Not(inner) => Ok(single("$nor", Value::Array(vec![Value::Document(self.emit(inner)?)]))),
            Node::Group(inner) => self.emit(inner),
        }
    }

    fn emit_all(&self, operands: &[Node]) -> Result<Value, EmitError> {
        let docs = operands
            .iter()
            .map(|node| self.emit(node).map(Value::Document))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(docs))
    }

    fn emit_and(&self, operands: &[Node]) -> Result<Document, EmitError> {
        let docs = operands
            .iter()
            .map(|node| self.emit(node))
            .collect::<Result<Vec<_>, _>>()?;

        if self.options.merge_conjunctions && keys_are_disjoint(&docs) {
            return Ok(docs.into_iter().flatten().collect());
        }
        Ok(single("$and", Value::Array(docs.into_iter().map(Value::Document).collect())))
    }
}

fn keys_are_disjoint(docs: &[Document]) -> bool {
    let mut seen = HashSet::new();
    docs.iter().flat_map(|doc| doc.keys()).all(|key| seen.insert(key))
}

fn single(key: &str, value: Value) -> Document {
    let mut doc = Document::with_capacity(1);
    doc.insert(key.to_string(), value);
    doc
}

/// MongoDB query operator for a comparison.
pub fn operator_keyword(op: CompOp) -> &'static str {
    match op {
        CompOp::Eq => "$eq",
        CompOp::Ne => "$ne",
        CompOp::Gt => "$gt",
        CompOp::Gte => "$gte",
        CompOp::Lt => "$lt",
        CompOp::Lte => "$lte",
        CompOp::In => "$in",
        CompOp::NotIn => "$nin",
        CompOp::Regex => "$regex",
        CompOp::Exists => "$exists",
    }
}

/// Membership needs an array and `~` needs a string; nothing is coerced.
fn check_operand(op: CompOp, value: &Literal, span: Span) -> Result<(), EmitError> {
    let expected = match (op, value) {
        (CompOp::In | CompOp::NotIn, Literal::Array(_)) => return Ok(()),
        (CompOp::In | CompOp::NotIn, _) => "an array",
        (CompOp::Regex, Literal::String(_)) => return Ok(()),
        (CompOp::Regex, _) => "a string",
        (CompOp::Exists, Literal::Bool(_)) => return Ok(()),
        (CompOp::Exists, _) => "a boolean",
        _ => return Ok(()),
    };
    Err(EmitError {
        span,
        op: op.symbol(),
        expected,
        found: value.type_name(),
    })
}

fn literal_to_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Number(Number::Int(n)) => Value::Int(*n),
        Literal::Number(Number::Float(n)) => Value::Double(*n),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
        Literal::Array(items) => Value::Array(items.iter().map(literal_to_value).collect()),
        Literal::Date(raw, span) => Value::Marker(MarkerEnvelope::new(MarkerKind::Date, raw.clone()).at(*span)),
        Literal::Id(raw, span) => Value::Marker(MarkerEnvelope::new(MarkerKind::ObjectId, raw.clone()).at(*span)),
    }
}
