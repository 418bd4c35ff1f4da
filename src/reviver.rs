//! Literal reviver: replaces marker envelopes with typed values.
//!
//! Decoding is table driven, one decoder per [`MarkerKind`]. The traversal
//! never looks at marker kinds itself, so adding a typed literal means adding
//! a kind and registering its decoder.

use std::collections::HashMap;

use bson::oid::ObjectId;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::document::{Document, MarkerEnvelope, MarkerKind, Value};
use crate::error::{LiteralError, LiteralErrorKind};

/// Turns the raw text of an envelope into a typed value.
pub type Decoder = fn(&str) -> Result<Value, LiteralErrorKind>;

#[derive(Debug, Clone)]
pub struct Reviver {
    decoders: HashMap<MarkerKind, Decoder>,
}

impl Default for Reviver {
    /// Revives both dates and ObjectIds.
    fn default() -> Self {
        Self::empty()
            .with_decoder(MarkerKind::Date, decode_date)
            .with_decoder(MarkerKind::ObjectId, decode_object_id)
    }
}

impl Reviver {
    /// A reviver with no decoders; every envelope is rejected.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Revives dates only.
    pub fn dates_only() -> Self {
        Self::empty().with_decoder(MarkerKind::Date, decode_date)
    }

    pub fn with_decoder(mut self, kind: MarkerKind, decoder: Decoder) -> Self {
        self.decoders.insert(kind, decoder);
        self
    }

    pub fn supports(&self, kind: MarkerKind) -> bool {
        self.decoders.contains_key(&kind)
    }

    fn decode(&self, envelope: &MarkerEnvelope) -> Result<Value, LiteralError> {
        let decoder = self
            .decoders
            .get(&envelope.kind)
            .ok_or_else(|| {
                LiteralError::new(LiteralErrorKind::UnsupportedMarker, envelope.kind.key()).at(envelope.span)
            })?;
        decoder(&envelope.raw).map_err(|kind| LiteralError::new(kind, envelope.raw.as_str()).at(envelope.span))
    }

    /// Replaces every envelope below `value`. Already revived values pass
    /// through untouched, so reviving twice is a no-op.
    pub fn revive(&self, value: Value) -> Result<Value, LiteralError> {
        match value {
            Value::Marker(envelope) => self.decode(&envelope),
            Value::Array(items) => Ok(Value::Array(
                items
                    .into_iter()
                    .map(|item| self.revive(item))
                    .collect::<Result<_, _>>()?,
            )),
            Value::Document(doc) => Ok(Value::Document(self.revive_document(doc)?)),
            other => Ok(other),
        }
    }

    pub fn revive_document(&self, doc: Document) -> Result<Document, LiteralError> {
        doc.into_iter()
            .map(|(key, value)| -> Result<(String, Value), LiteralError> { Ok((key, self.revive(value)?)) })
            .collect()
    }

    /// Converts generic JSON, reviving every object that is exactly
    /// `{"<registered marker key>": "<string>"}`. Other objects, including
    /// envelopes whose kind has no decoder here, convert structurally.
    pub fn revive_json(&self, json: serde_json::Value) -> Result<Value, LiteralError> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.revive_json(item))
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(map) => {
                if let Some(envelope) = self.envelope_of(&map) {
                    return self.decode(&envelope);
                }
                Value::Document(
                    map.into_iter()
                        .map(|(key, value)| -> Result<(String, Value), LiteralError> {
                            Ok((key, self.revive_json(value)?))
                        })
                        .collect::<Result<_, _>>()?,
                )
            }
        })
    }

    fn envelope_of(&self, map: &serde_json::Map<String, serde_json::Value>) -> Option<MarkerEnvelope> {
        if map.len() != 1 {
            return None;
        }
        let (key, value) = map.iter().next()?;
        let kind = MarkerKind::from_key(key).filter(|kind| self.supports(*kind))?;
        let raw = value.as_str()?;
        Some(MarkerEnvelope::new(kind, raw))
    }

    /// Parses Extended JSON text into a typed document, the way
    /// `JSON.parse(text, reviver)` would.
    pub fn revive_json_str(&self, text: &str) -> Result<Document, LiteralError> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| LiteralError::new(LiteralErrorKind::InvalidJson, e.to_string()))?;
        match self.revive_json(json)? {
            Value::Document(doc) => Ok(doc),
            _ => Err(LiteralError::new(
                LiteralErrorKind::InvalidJson,
                "top-level value is not an object",
            )),
        }
    }
}

/// Parses an ISO-8601 date as a UTC instant truncated to milliseconds.
///
/// Accepted: RFC 3339 date-times with `Z` or an offset, date-times without an
/// offset (taken as UTC), and bare dates (UTC midnight).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|date| date.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })?;
    DateTime::from_timestamp_millis(parsed.timestamp_millis())
}

pub fn decode_date(raw: &str) -> Result<Value, LiteralErrorKind> {
    parse_date(raw).map(Value::Date).ok_or(LiteralErrorKind::InvalidDate)
}

pub fn decode_object_id(raw: &str) -> Result<Value, LiteralErrorKind> {
    ObjectId::parse_str(raw)
        .map(Value::ObjectId)
        .map_err(|_| LiteralErrorKind::InvalidId)
}
