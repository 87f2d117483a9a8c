//! Type-tagged scalar encoding.
//!
//! | type        | bytes                                   |
//! |-------------|-----------------------------------------|
//! | int32/int64 | little-endian, 4/8 bytes                |
//! | float32/64  | little-endian IEEE-754, 4/8 bytes       |
//! | bool        | one byte, 0 or 1                        |
//! | string      | UTF-8                                   |
//! | bytes       | unchanged                               |
//! | timestamp   | UTF-8 `YYYY-MM-DDTHH:MM:SS.fffffffff`   |
//! | uuid        | 16 raw bytes                            |
//! | json        | UTF-8 JSON text (fallback for the rest) |
//!
//! NULL and absent values encode to no bytes; no bytes decode to the zero
//! value of the requested type.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::db::{ScalarType, ScalarValue, TIMESTAMP_FORMAT};
use crate::error::{RawQueryError, Result};

/// Encodes a scalar value. `None` and `Null` produce an empty vector.
pub fn encode_scalar(value: Option<&ScalarValue>) -> Result<Vec<u8>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };

    let bytes = match value {
        ScalarValue::Null => Vec::new(),
        ScalarValue::Int32(v) => v.to_le_bytes().to_vec(),
        ScalarValue::Int64(v) => v.to_le_bytes().to_vec(),
        ScalarValue::Float32(v) => v.to_le_bytes().to_vec(),
        ScalarValue::Float64(v) => v.to_le_bytes().to_vec(),
        ScalarValue::Bool(v) => vec![u8::from(*v)],
        ScalarValue::String(v) => v.as_bytes().to_vec(),
        ScalarValue::Bytes(v) => v.clone(),
        ScalarValue::Timestamp(v) => v.format(TIMESTAMP_FORMAT).to_string().into_bytes(),
        ScalarValue::Uuid(v) => v.as_bytes().to_vec(),
        ScalarValue::Json(v) => serde_json::to_vec(v)?,
    };
    Ok(bytes)
}

/// Decodes bytes produced by [`encode_scalar`] using the carried type name.
///
/// Unknown type names are decoded as JSON.
pub fn decode_scalar(bytes: &[u8], type_name: &str) -> Result<ScalarValue> {
    let scalar_type = ScalarType::from_name(type_name);
    if bytes.is_empty() {
        return Ok(zero_value(scalar_type));
    }

    let value = match scalar_type {
        ScalarType::Int32 => ScalarValue::Int32(i32::from_le_bytes(fixed(bytes, type_name)?)),
        ScalarType::Int64 => ScalarValue::Int64(i64::from_le_bytes(fixed(bytes, type_name)?)),
        ScalarType::Float32 => ScalarValue::Float32(f32::from_le_bytes(fixed(bytes, type_name)?)),
        ScalarType::Float64 => ScalarValue::Float64(f64::from_le_bytes(fixed(bytes, type_name)?)),
        ScalarType::Bool => ScalarValue::Bool(u8::from_le_bytes(fixed(bytes, type_name)?) != 0),
        ScalarType::String => ScalarValue::String(utf8(bytes)?.to_string()),
        ScalarType::Bytes => ScalarValue::Bytes(bytes.to_vec()),
        ScalarType::Timestamp => {
            let text = utf8(bytes)?;
            let parsed = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .map_err(|e| RawQueryError::encoding(format!("Invalid timestamp '{text}': {e}")))?;
            ScalarValue::Timestamp(parsed)
        }
        ScalarType::Uuid => ScalarValue::Uuid(Uuid::from_bytes(fixed(bytes, type_name)?)),
        ScalarType::Json => ScalarValue::Json(serde_json::from_slice(bytes)?),
    };
    Ok(value)
}

fn zero_value(scalar_type: ScalarType) -> ScalarValue {
    match scalar_type {
        ScalarType::Int32 => ScalarValue::Int32(0),
        ScalarType::Int64 => ScalarValue::Int64(0),
        ScalarType::Float32 => ScalarValue::Float32(0.0),
        ScalarType::Float64 => ScalarValue::Float64(0.0),
        ScalarType::Bool => ScalarValue::Bool(false),
        ScalarType::String => ScalarValue::String(String::new()),
        ScalarType::Bytes => ScalarValue::Bytes(Vec::new()),
        ScalarType::Timestamp => ScalarValue::Timestamp(NaiveDateTime::default()),
        ScalarType::Uuid => ScalarValue::Uuid(Uuid::nil()),
        ScalarType::Json => ScalarValue::Json(serde_json::Value::Null),
    }
}

fn fixed<const N: usize>(bytes: &[u8], type_name: &str) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        RawQueryError::encoding(format!(
            "Expected {N} bytes for {type_name}, got {}",
            bytes.len()
        ))
    })
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| RawQueryError::encoding(format!("Invalid UTF-8: {e}")))
}
