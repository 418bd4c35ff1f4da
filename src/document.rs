//! Typed filter documents.
//!
//! A [`Document`] is an insertion-ordered map, as MongoDB documents are.
//! Between the emitter and the reviver, dates and ObjectIds travel as
//! [`MarkerEnvelope`]s holding the raw source text; after revival every
//! envelope has been replaced by a [`Value::Date`] or [`Value::ObjectId`].
//!
//! Documents serialize to MongoDB relaxed Extended JSON:
//!
//! ```text
//! {"created": {"$gte": {"$date": "2015-01-01T00:00:00.000Z"}}, "_id": {"$oid": "507f1f77bcf86cd799439011"}}
//! ```
//!
//! and convert to [`bson::Document`] with [`to_bson`] for use as a driver
//! filter.

use bson::oid::ObjectId;
use bson::Bson;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::token::Span;

pub type Document = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    /// Millisecond precision, like BSON dates.
    Date(DateTime<Utc>),
    ObjectId(ObjectId),
    Array(Vec<Value>),
    Document(Document),
    /// Not yet revived typed literal.
    Marker(MarkerEnvelope),
}

/// Typed literal kinds that need revival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Date,
    ObjectId,
}

impl MarkerKind {
    pub const ALL: [MarkerKind; 2] = [MarkerKind::Date, MarkerKind::ObjectId];

    /// The single key of the envelope in Extended JSON.
    pub fn key(self) -> &'static str {
        match self {
            MarkerKind::Date => "$date",
            MarkerKind::ObjectId => "$oid",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        MarkerKind::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerEnvelope {
    pub kind: MarkerKind,
    pub raw: String,
    /// Where the literal was written, for envelopes emitted from a query.
    pub span: Option<Span>,
}

impl MarkerEnvelope {
    pub fn new(kind: MarkerKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
            span: None,
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

impl Value {
    /// Whether a marker envelope remains anywhere below this value.
    pub fn has_markers(&self) -> bool {
        match self {
            Value::Marker(_) => true,
            Value::Array(items) => items.iter().any(Value::has_markers),
            Value::Document(doc) => doc.values().any(Value::has_markers),
            _ => false,
        }
    }
}

/// Whether a marker envelope remains anywhere in `doc`.
pub fn has_markers(doc: &Document) -> bool {
    doc.values().any(Value::has_markers)
}

/// Renders an Extended JSON date, e.g. `2015-01-01T00:00:00.000Z`.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_envelope<S: Serializer>(serializer: S, key: &str, raw: &str) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, raw)?;
    map.end()
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(date) => serialize_envelope(serializer, MarkerKind::Date.key(), &format_date(date)),
            Value::ObjectId(id) => serialize_envelope(serializer, MarkerKind::ObjectId.key(), &id.to_hex()),
            Value::Marker(envelope) => serialize_envelope(serializer, envelope.kind.key(), &envelope.raw),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Document(doc) => doc.serialize(serializer),
        }
    }
}

impl From<Value> for Bson {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Bson::Null,
            Value::Bool(b) => Bson::Boolean(b),
            Value::Int(i) => Bson::Int64(i),
            Value::Double(d) => Bson::Double(d),
            Value::String(s) => Bson::String(s),
            Value::Date(date) => Bson::DateTime(bson::DateTime::from_millis(date.timestamp_millis())),
            Value::ObjectId(id) => Bson::ObjectId(id),
            Value::Array(items) => Bson::Array(items.into_iter().map(Bson::from).collect()),
            Value::Document(doc) => Bson::Document(to_bson(doc)),
            // Unrevived: keep the Extended JSON shape.
            Value::Marker(envelope) => {
                let mut doc = bson::Document::new();
                doc.insert(envelope.kind.key(), envelope.raw);
                Bson::Document(doc)
            }
        }
    }
}

/// Converts a filter into the document type the MongoDB driver takes,
/// keeping key order.
pub fn to_bson(doc: Document) -> bson::Document {
    doc.into_iter().map(|(key, value)| (key, Bson::from(value))).collect()
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Self {
        Value::Date(date)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::ObjectId(id)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Document(doc)
    }
}
