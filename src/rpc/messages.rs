//! Wire messages for the `rawquery.RawQuery` service.
//!
//! Declared with `prost` derives; equivalent to:
//!
//! ```proto
//! message ExecuteRequest    { string query = 1; optional string parameters_json = 2; }
//! message ScalarResponse    { bytes value = 1; string type_name = 2; bool is_null = 3; }
//! message SingleRowResponse { bytes row_bytes = 1; repeated string column_names = 2;
//!                             repeated string column_types = 3; bool is_empty = 4; }
//! message RowSetResponse    { bytes rows_bytes = 1; repeated string column_names = 2;
//!                             repeated string column_types = 3; int32 row_count = 4; }
//! message NonQueryResponse  { int32 rows_affected = 1; }
//! ```

/// Query text plus an optional JSON object of parameters.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteRequest {
    #[prost(string, tag = "1")]
    pub query: String,
    #[prost(string, optional, tag = "2")]
    pub parameters_json: Option<String>,
}

impl ExecuteRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters_json: None,
        }
    }

    pub fn with_parameters(mut self, parameters_json: impl Into<String>) -> Self {
        self.parameters_json = Some(parameters_json.into());
        self
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ScalarResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub value: Vec<u8>,
    #[prost(string, tag = "2")]
    pub type_name: String,
    #[prost(bool, tag = "3")]
    pub is_null: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SingleRowResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub row_bytes: Vec<u8>,
    #[prost(string, repeated, tag = "2")]
    pub column_names: Vec<String>,
    #[prost(string, repeated, tag = "3")]
    pub column_types: Vec<String>,
    #[prost(bool, tag = "4")]
    pub is_empty: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RowSetResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub rows_bytes: Vec<u8>,
    #[prost(string, repeated, tag = "2")]
    pub column_names: Vec<String>,
    #[prost(string, repeated, tag = "3")]
    pub column_types: Vec<String>,
    #[prost(int32, tag = "4")]
    pub row_count: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NonQueryResponse {
    #[prost(int32, tag = "1")]
    pub rows_affected: i32,
}
