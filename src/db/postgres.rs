//! PostgreSQL executor implementation.
//!
//! Provides the `PostgresExecutor` struct that implements the `QueryExecutor`
//! trait for PostgreSQL databases using sqlx.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column as SqlxColumn, Postgres, Row as SqlxRow, TypeInfo};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{QueryExecutor, QueryParameters, Row, ScalarResult, ScalarType, ScalarValue};
use crate::config::{ConnectionConfig, DatabaseConfig};
use crate::error::{RawQueryError, Result};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// PostgreSQL query executor.
#[derive(Debug)]
pub struct PostgresExecutor {
    pool: PgPool,
    query_timeout: Duration,
    max_rows: usize,
}

impl PostgresExecutor {
    /// Creates an executor from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: PgPool, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            max_rows: config.max_rows,
        }
    }

    /// Connects to the configured database, retrying transient failures.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let conn_str = config.connection.to_connection_string()?;

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Successfully connected to database");
                    return Ok(Self::from_pool(pool, config));
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2; // Exponential backoff
                    } else {
                        break;
                    }
                }
            }
        }

        Err(match last_error {
            Some(error) => map_connection_error(error, &config.connection),
            None => RawQueryError::connection("No connection attempt was made"),
        })
    }

    /// Runs a database future under the query timeout, abandoning it on cancel.
    ///
    /// Dropping the sqlx future returns its connection to the pool.
    async fn run<T, F>(&self, cancel: &CancellationToken, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>> + Send,
    {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Query cancelled by caller");
                Err(RawQueryError::Cancelled)
            }
            result = tokio::time::timeout(self.query_timeout, fut) => {
                result
                    .map_err(|_| {
                        RawQueryError::execution(format!(
                            "Query timed out after {} seconds",
                            self.query_timeout.as_secs()
                        ))
                    })?
                    .map_err(|e| RawQueryError::execution(format_query_error(e)))
            }
        }
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute_scalar(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<ScalarResult> {
        let row = self
            .run(cancel, bind_parameters(sql, params).fetch_optional(&self.pool))
            .await?;

        let Some(row) = row else {
            return Ok(ScalarResult::null(ScalarType::Json));
        };
        let Some(column) = row.columns().first() else {
            return Ok(ScalarResult::null(ScalarType::Json));
        };

        let type_name = column.type_info().name();
        let declared_type = declared_scalar_type(type_name);
        let value = convert_value(&row, 0, type_name)?;
        Ok(ScalarResult {
            value: (!value.is_null()).then_some(value),
            declared_type,
        })
    }

    async fn execute_single(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<Option<Row>> {
        let row = self
            .run(cancel, bind_parameters(sql, params).fetch_optional(&self.pool))
            .await?;
        row.as_ref().map(convert_row).transpose()
    }

    async fn execute_multiple(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>> {
        let max_rows = self.max_rows;
        let pool = &self.pool;
        let (rows, truncated) = self
            .run(cancel, async move {
                let mut stream = bind_parameters(sql, params).fetch(pool);
                let mut rows = Vec::new();
                while let Some(row) = stream.try_next().await? {
                    if rows.len() == max_rows {
                        return Ok((rows, true));
                    }
                    rows.push(row);
                }
                Ok::<_, sqlx::Error>((rows, false))
            })
            .await?;

        if truncated {
            warn!("Query returned more than {} rows, truncating", max_rows);
        }
        rows.iter().map(convert_row).collect()
    }

    async fn execute_non_query(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<i64> {
        let outcome = self
            .run(cancel, bind_parameters(sql, params).execute(&self.pool))
            .await?;
        i64::try_from(outcome.rows_affected())
            .map_err(|_| RawQueryError::encoding("Affected row count exceeds i64"))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Binds parameters positionally (`$1`, `$2`, ...) in payload key order.
fn bind_parameters<'q>(
    sql: &'q str,
    params: &'q QueryParameters,
) -> Query<'q, Postgres, PgArguments> {
    use serde_json::Value as J;

    params.values().fold(sqlx::query(sql), |query, value| match value {
        J::Null => query.bind(None::<String>),
        J::Bool(b) => query.bind(*b),
        J::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        J::String(s) => query.bind(s.as_str()),
        other => query.bind(sqlx::types::Json(other)),
    })
}

/// Maps a Postgres type name to the scalar type tag reported on the wire.
fn declared_scalar_type(type_name: &str) -> ScalarType {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => ScalarType::Bool,
        "INT2" | "SMALLINT" | "INT4" | "INT" | "INTEGER" => ScalarType::Int32,
        "INT8" | "BIGINT" => ScalarType::Int64,
        "FLOAT4" | "REAL" => ScalarType::Float32,
        "FLOAT8" | "DOUBLE PRECISION" => ScalarType::Float64,
        "BYTEA" => ScalarType::Bytes,
        "UUID" => ScalarType::Uuid,
        "TIMESTAMP" | "TIMESTAMPTZ" => ScalarType::Timestamp,
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => ScalarType::String,
        _ => ScalarType::Json,
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            convert_value(row, i, col.type_info().name()).map(|value| (col.name(), value))
        })
        .collect()
}

/// Converts a single column value from a PgRow to our ScalarValue type.
///
/// Types without a dedicated scalar become JSON. A value that cannot be
/// decoded at all is an encoding error, never a silent null.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Result<ScalarValue> {
    use serde_json::Value as J;

    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => cell(row, index, type_name, ScalarValue::Bool),
        "INT2" | "SMALLINT" => cell(row, index, type_name, |v: i16| ScalarValue::Int32(v.into())),
        "INT4" | "INT" | "INTEGER" => cell(row, index, type_name, ScalarValue::Int32),
        "INT8" | "BIGINT" => cell(row, index, type_name, ScalarValue::Int64),
        "FLOAT4" | "REAL" => cell(row, index, type_name, ScalarValue::Float32),
        "FLOAT8" | "DOUBLE PRECISION" => cell(row, index, type_name, ScalarValue::Float64),
        "BYTEA" => cell(row, index, type_name, ScalarValue::Bytes),
        "UUID" => cell(row, index, type_name, ScalarValue::Uuid),
        "TIMESTAMP" => cell(row, index, type_name, ScalarValue::Timestamp),
        "TIMESTAMPTZ" => cell(row, index, type_name, |v: chrono::DateTime<chrono::Utc>| {
            ScalarValue::Timestamp(v.naive_utc())
        }),
        "JSON" | "JSONB" => cell(row, index, type_name, ScalarValue::Json),

        // Exact decimal text; a JSON number would round through f64.
        "NUMERIC" | "DECIMAL" => cell(row, index, type_name, |v: sqlx::types::Decimal| {
            ScalarValue::Json(J::String(v.to_string()))
        }),
        "DATE" => cell(row, index, type_name, |v: chrono::NaiveDate| {
            ScalarValue::Json(J::String(v.to_string()))
        }),
        "TIME" => cell(row, index, type_name, |v: chrono::NaiveTime| {
            ScalarValue::Json(J::String(v.to_string()))
        }),
        "INTERVAL" => cell(row, index, type_name, |v: PgInterval| {
            ScalarValue::Json(serde_json::json!({
                "months": v.months,
                "days": v.days,
                "microseconds": v.microseconds,
            }))
        }),
        "TEXT[]" | "VARCHAR[]" | "NAME[]" => cell(row, index, type_name, |v: Vec<String>| {
            ScalarValue::Json(J::from(v))
        }),
        "INT2[]" => cell(row, index, type_name, |v: Vec<i16>| ScalarValue::Json(J::from(v))),
        "INT4[]" => cell(row, index, type_name, |v: Vec<i32>| ScalarValue::Json(J::from(v))),
        "INT8[]" => cell(row, index, type_name, |v: Vec<i64>| ScalarValue::Json(J::from(v))),
        "BOOL[]" => cell(row, index, type_name, |v: Vec<bool>| ScalarValue::Json(J::from(v))),

        // Text types, and anything else sqlx can read as text
        _ => cell(row, index, type_name, ScalarValue::String),
    }
}

/// Decodes one nullable cell, wrapping a present value.
fn cell<'r, T>(
    row: &'r PgRow,
    index: usize,
    type_name: &str,
    wrap: impl FnOnce(T) -> ScalarValue,
) -> Result<ScalarValue>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .map(|value| value.map(wrap).unwrap_or_default())
        .map_err(|e| {
            RawQueryError::encoding(format!(
                "Cannot decode column {index} of type {type_name}: {e}"
            ))
        })
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
    {
        return true;
    }

    // Default to not retrying authentication, missing-database and unknown errors
    false
}

/// Maps sqlx connection errors to operator-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> RawQueryError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        RawQueryError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("authentication failed") {
        RawQueryError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        RawQueryError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        RawQueryError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        RawQueryError::connection(error.to_string())
    }
}

/// Formats a query error, keeping Postgres detail and hint lines.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = format!("ERROR: {}", db_error.message());
    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }
    result
}
