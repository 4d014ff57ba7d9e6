//! Sensitive field redaction for request log records.
//!
//! Walks query parameters and response bodies and replaces the values of
//! sensitive keys with a sentinel string, at every nesting depth.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::TrackingError;

use super::literal::parse_container;

/// Keys that are always redacted (compared lowercased).
pub const BASE_SENSITIVE_FIELDS: &[&str] = &["api", "key", "password", "signature", "token"];

/// Default replacement for redacted values.
pub const DEFAULT_REDACTION_SENTINEL: &str = "******";

/// A validated redaction sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionSentinel(String);

impl RedactionSentinel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RedactionSentinel {
    fn default() -> Self {
        Self(DEFAULT_REDACTION_SENTINEL.to_string())
    }
}

impl TryFrom<Value> for RedactionSentinel {
    type Error = TrackingError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(sentinel) => Ok(Self(sentinel)),
            other => Err(TrackingError::Config {
                message: format!("redaction sentinel must be a string, got {}", other),
            }),
        }
    }
}

/// Redacts sensitive keys from structured values.
///
/// Immutable once built, so one redactor is shared by every request an
/// endpoint serves.
#[derive(Debug, Clone)]
pub struct FieldRedactor {
    sensitive_fields: HashSet<String>,
    sentinel: RedactionSentinel,
}

impl FieldRedactor {
    /// Build a redactor from the base set plus `extra_fields`.
    pub fn new<I, S>(extra_fields: I, sentinel: RedactionSentinel) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sensitive_fields = BASE_SENSITIVE_FIELDS
            .iter()
            .map(|field| field.to_string())
            .chain(extra_fields.into_iter().map(|f| f.as_ref().to_lowercase()))
            .collect();

        Self {
            sensitive_fields,
            sentinel,
        }
    }

    /// Whether `key` names a sensitive field.
    pub fn is_sensitive(&self, key: &str) -> bool {
        self.sensitive_fields.contains(&key.to_lowercase())
    }

    pub fn sentinel(&self) -> &str {
        self.sentinel.as_str()
    }

    /// Return a redacted copy of `value`.
    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.redact_map(map)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            other => other.clone(),
        }
    }

    fn redact_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        let mut redacted = Map::with_capacity(map.len());
        for (key, value) in map {
            let decoded = decode_structured(value);
            let mut cleaned = match decoded {
                Some(structured) => self.redact(&structured),
                None if value.is_object() || value.is_array() => self.redact(value),
                None => value.clone(),
            };

            // Applied after recursion, replacing any redacted children wholesale
            if self.is_sensitive(key) {
                cleaned = Value::String(self.sentinel.as_str().to_string());
            }

            redacted.insert(key.clone(), cleaned);
        }
        redacted
    }
}

impl Default for FieldRedactor {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>(), RedactionSentinel::default())
    }
}

/// Decode a string that holds a serialized object or array.
///
/// JSON is tried first, then the `repr` literal form (single quotes,
/// `True`/`False`/`None`, tuples). Returns `None` for anything else,
/// including strings holding scalars, so such values stay strings.
pub fn decode_structured(value: &Value) -> Option<Value> {
    let text = value.as_str()?.trim();
    if !(text.starts_with('{') || text.starts_with('[')) {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(decoded @ (Value::Object(_) | Value::Array(_))) => Some(decoded),
        _ => parse_container(text),
    }
}
