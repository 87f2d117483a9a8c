//! Wire encoding for query results.
//!
//! Scalars use a compact per-type binary form selected by an explicit type
//! tag. Rows and row sets are self-describing JSON, because their shape is
//! only known at runtime.

mod rows;
mod scalar;

pub use rows::{
    decode_row_set, decode_single_row, encode_row_set, encode_single_row, extract_column_info,
};
pub use scalar::{decode_scalar, encode_scalar};
