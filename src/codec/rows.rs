//! JSON encoding for single rows and row sets.

use crate::db::{Row, ScalarValue};
use crate::error::{RawQueryError, Result};

type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Encodes one row as a JSON object. `None` produces an empty vector.
pub fn encode_single_row(row: Option<&Row>) -> Result<Vec<u8>> {
    match row {
        Some(row) => Ok(serde_json::to_vec(row)?),
        None => Ok(Vec::new()),
    }
}

/// Decodes a row encoded by [`encode_single_row`], preserving column order.
pub fn decode_single_row(bytes: &[u8]) -> Result<Option<Row>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let object: Option<JsonObject> = serde_json::from_slice(bytes)
        .map_err(|e| RawQueryError::encoding(format!("Row is not a JSON object: {e}")))?;
    Ok(object.map(row_from_object))
}

/// Encodes a row set as a JSON array of objects. No rows produce an empty vector.
pub fn encode_row_set(rows: &[Row]) -> Result<Vec<u8>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::to_vec(rows)?)
}

/// Decodes a row set encoded by [`encode_row_set`].
pub fn decode_row_set(bytes: &[u8]) -> Result<Vec<Row>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let objects: Vec<JsonObject> = serde_json::from_slice(bytes)
        .map_err(|e| RawQueryError::encoding(format!("Row set is not a JSON array: {e}")))?;
    Ok(objects.into_iter().map(row_from_object).collect())
}

/// Column names and type names of a row, in column order.
///
/// No row yields two empty lists.
pub fn extract_column_info(row: Option<&Row>) -> (Vec<String>, Vec<String>) {
    let Some(row) = row else {
        return (Vec::new(), Vec::new());
    };
    row.iter()
        .map(|(name, value)| (name.to_string(), value.type_name().to_string()))
        .unzip()
}

fn row_from_object(object: JsonObject) -> Row {
    object
        .into_iter()
        .map(|(name, value)| (name, ScalarValue::from_json(value)))
        .collect()
}
