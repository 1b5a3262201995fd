//! Record and field path types.
//!
//! Entity records are untyped JSON objects. Every access to a record field
//! goes through a [`FieldPath`], which is validated when a page descriptor is
//! loaded, so a malformed field reference is a load-time failure rather than
//! a lookup that silently returns nothing at render time.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigError, QueryError};

// =============================================================================
// FieldPath
// =============================================================================

/// Validated, possibly dotted, path to a record field (`"requestedBy.name"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(String);

impl FieldPath {
    /// Parse a field path.
    ///
    /// Rejects empty paths, empty segments (`"a..b"`, `".a"`) and whitespace.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.is_empty() {
            return Err(ConfigError::InvalidFieldPath {
                path: raw.to_string(),
                reason: "path is empty",
            });
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidFieldPath {
                path: raw.to_string(),
                reason: "path contains whitespace",
            });
        }
        if raw.split('.').any(str::is_empty) {
            return Err(ConfigError::InvalidFieldPath {
                path: raw.to_string(),
                reason: "path has an empty segment",
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// The path as written in the descriptor.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// First segment, i.e. the top-level record key.
    pub fn root(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// True if this path equals `other` or names something nested under it.
    pub fn is_within(&self, other: &FieldPath) -> bool {
        self.0 == other.0
            || (self.0.starts_with(&other.0) && self.0.as_bytes().get(other.0.len()) == Some(&b'.'))
    }

    /// Resolve the path against a record.
    ///
    /// Returns `None` when any segment is missing or a non-object is walked
    /// through. An explicit JSON `null` resolves to `Some(Value::Null)`.
    pub fn resolve<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        let mut segments = self.segments();
        let first = segments.next()?;
        let mut current = record.values.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// RecordId
// =============================================================================

/// Stable record identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Record
// =============================================================================

/// One entity record.
///
/// The `id` key is mandatory and must be a string or an integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Record {
    id: RecordId,
    values: Map<String, Value>,
}

impl Record {
    /// Build a record from a JSON object.
    pub fn from_map(values: Map<String, Value>) -> Result<Self, QueryError> {
        let id = match values.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
            Some(other) => {
                return Err(QueryError::InvalidRecord(format!(
                    "record id must be a non-empty string or integer, got {other}"
                )))
            }
            None => {
                return Err(QueryError::InvalidRecord(
                    "record has no `id` field".to_string(),
                ))
            }
        };
        Ok(Self {
            id: RecordId(id),
            values,
        })
    }

    /// Build a record from any JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(QueryError::InvalidRecord(format!(
                "record must be a JSON object, got {other}"
            ))),
        }
    }

    /// The record's identifier.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Resolve a field path against this record.
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        path.resolve(self)
    }

    /// All top-level values.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Copy of this record restricted to the top-level keys named by `fields`.
    ///
    /// The `id` key is always kept. An empty field set keeps everything.
    pub fn project(&self, fields: &BTreeSet<FieldPath>) -> Record {
        if fields.is_empty() {
            return self.clone();
        }
        let values = self
            .values
            .iter()
            .filter(|(key, _)| key.as_str() == "id" || fields.iter().any(|f| f.root() == *key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Record {
            id: self.id.clone(),
            values,
        }
    }
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = QueryError;

    fn try_from(value: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::from_map(value)
    }
}

impl From<Record> for Map<String, Value> {
    fn from(record: Record) -> Self {
        record.values
    }
}

// =============================================================================
// Tests
// =============================================================================
