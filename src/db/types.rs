//! Raw result types produced by query executors.
//!
//! Scalars are a closed set of tagged variants so the codec can encode and
//! decode each one without runtime type inspection. Rows are ordered
//! association lists; column order is whatever the executor produced.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::NaiveDateTime;
use serde::ser::{Error as _, Serialize, SerializeMap, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Parameter bag bound by the executor. Keys keep their payload order.
pub type QueryParameters = serde_json::Map<String, serde_json::Value>;

/// Type tag carried alongside encoded scalar bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalarType {
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    String,
    Bytes,
    Timestamp,
    Uuid,
    /// Anything else, carried as JSON text.
    #[default]
    Json,
}

impl ScalarType {
    /// Wire name of the type tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Timestamp => "timestamp",
            Self::Uuid => "uuid",
            Self::Json => "json",
        }
    }

    /// Parses a wire type name. Unrecognised names fall back to `Json`.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or(Self::Json)
    }
}

impl FromStr for ScalarType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "int32" | "int" | "integer" => Ok(Self::Int32),
            "int64" | "long" | "bigint" => Ok(Self::Int64),
            "float32" | "float" | "real" => Ok(Self::Float32),
            "float64" | "double" => Ok(Self::Float64),
            "bool" | "boolean" => Ok(Self::Bool),
            "string" | "text" => Ok(Self::String),
            "bytes" | "binary" => Ok(Self::Bytes),
            "timestamp" | "datetime" => Ok(Self::Timestamp),
            "uuid" | "guid" => Ok(Self::Uuid),
            "json" => Ok(Self::Json),
            other => Err(format!("Unknown scalar type: {other}")),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed value, as a scalar result or a row cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScalarValue {
    /// SQL NULL. Only meaningful inside rows; scalar results use `None`.
    #[default]
    Null,
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    Uuid(Uuid),
    Json(serde_json::Value),
}

impl ScalarValue {
    /// Returns the type tag for this value. `Null` reports `Json`.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Null | Self::Json(_) => ScalarType::Json,
            Self::Int32(_) => ScalarType::Int32,
            Self::Int64(_) => ScalarType::Int64,
            Self::Float32(_) => ScalarType::Float32,
            Self::Float64(_) => ScalarType::Float64,
            Self::Bool(_) => ScalarType::Bool,
            Self::String(_) => ScalarType::String,
            Self::Bytes(_) => ScalarType::Bytes,
            Self::Timestamp(_) => ScalarType::Timestamp,
            Self::Uuid(_) => ScalarType::Uuid,
        }
    }

    /// Column type name reported in row metadata.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            other => other.scalar_type().name(),
        }
    }

    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Reconstructs a cell from decoded JSON.
    ///
    /// Row encoding is not type-tagged, so integers come back as `Int64`,
    /// other numbers as `Float64`, and timestamps/UUIDs/bytes as strings.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match value {
            J::Null => Self::Null,
            J::Bool(b) => Self::Bool(b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Self::Int64(i),
                None => n.as_f64().map(Self::Float64).unwrap_or(Self::Json(J::Number(n))),
            },
            J::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

/// Timestamp text format: ISO-8601, no offset, nanosecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9f";

impl Serialize for ScalarValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Int32(v) => serializer.serialize_i32(*v),
            Self::Int64(v) => serializer.serialize_i64(*v),
            // JSON has no NaN or infinity.
            Self::Float32(v) if !v.is_finite() => {
                Err(S::Error::custom(format!("non-finite float {v} cannot be encoded")))
            }
            Self::Float64(v) if !v.is_finite() => {
                Err(S::Error::custom(format!("non-finite float {v} cannot be encoded")))
            }
            Self::Float32(v) => serializer.serialize_f32(*v),
            Self::Float64(v) => serializer.serialize_f64(*v),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::String(v) => serializer.serialize_str(v),
            Self::Bytes(v) => serializer.serialize_str(&STANDARD.encode(v)),
            Self::Timestamp(v) => {
                serializer.collect_str(&v.format(TIMESTAMP_FORMAT))
            }
            Self::Uuid(v) => serializer.collect_str(&v.hyphenated()),
            Self::Json(v) => v.serialize(serializer),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
            Self::Uuid(v) => write!(f, "{v}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Uuid> for ScalarValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<NaiveDateTime> for ScalarValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl<T> From<Option<T>> for ScalarValue
where
    T: Into<ScalarValue>,
{
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Outcome of a scalar query: the value (if any) and the type the executor
/// declared for it, so NULL results still carry a type name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScalarResult {
    pub value: Option<ScalarValue>,
    pub declared_type: ScalarType,
}

impl ScalarResult {
    /// Wraps a non-null value, declaring its own type.
    pub fn of(value: impl Into<ScalarValue>) -> Self {
        let value = value.into();
        if value.is_null() {
            return Self::default();
        }
        Self {
            declared_type: value.scalar_type(),
            value: Some(value),
        }
    }

    /// A NULL result of the given declared type.
    pub fn null(declared_type: ScalarType) -> Self {
        Self {
            value: None,
            declared_type,
        }
    }
}

/// One result row: column names mapped to values in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, ScalarValue)>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, replacing the value in place if the name exists.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a column, keeping the original position on duplicate names.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ScalarValue>) {
        let name = name.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((name, value)),
        }
    }

    /// Looks up a column by name.
    pub fn get(&self, name: &str) -> Option<&ScalarValue> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, V: Into<ScalarValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The executor's in-memory outcome of a query, before wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    Scalar(ScalarResult),
    SingleRow(Option<Row>),
    RowSet(Vec<Row>),
    AffectedCount(i64),
}
