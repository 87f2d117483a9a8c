//! Postgres executor integration tests.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run them.

use std::sync::Arc;

use db_rawquery::codec::decode_single_row;
use db_rawquery::config::{ConnectionConfig, DatabaseConfig};
use db_rawquery::db::{PostgresExecutor, QueryExecutor, QueryParameters, ScalarType, ScalarValue};
use db_rawquery::error::RawQueryError;
use db_rawquery::policy::AllowAllPolicy;
use db_rawquery::query::{parse_parameters, QueryOrchestrator};
use db_rawquery::rpc::{CallerIdentity, ExecuteRequest};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create a test executor.
async fn get_test_executor() -> Option<PostgresExecutor> {
    let url = get_test_database_url()?;
    let config = DatabaseConfig {
        connection: ConnectionConfig::from_connection_string(&url).ok()?,
        max_rows: 3,
        ..DatabaseConfig::default()
    };
    PostgresExecutor::connect(&config).await.ok()
}

fn params(json: &str) -> QueryParameters {
    parse_parameters(Some(json)).unwrap()
}

#[tokio::test]
async fn test_scalar_with_bound_parameters() {
    let Some(executor) = get_test_executor().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute_scalar(
            "SELECT $1::int8 + $2::int8",
            &params(r#"{"a": 40, "b": 2}"#),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.value, Some(ScalarValue::Int64(42)));
    assert_eq!(result.declared_type, ScalarType::Int64);

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_null_scalar_keeps_declared_type() {
    let Some(executor) = get_test_executor().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute_scalar(
            "SELECT NULL::text",
            &QueryParameters::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.value, None);
    assert_eq!(result.declared_type, ScalarType::String);

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_multiple_rows_capped_at_max_rows() {
    let Some(executor) = get_test_executor().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let rows = executor
        .execute_multiple(
            "SELECT generate_series(1, 10) AS n",
            &QueryParameters::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].names().collect::<Vec<_>>(), vec!["n"]);

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_sql_error_is_execution_failure() {
    let Some(executor) = get_test_executor().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute_multiple(
            "SELECT * FROM nonexistent_table_xyz",
            &QueryParameters::new(),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(RawQueryError::Execution(_))));

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_cancel_aborts_long_query() {
    let Some(executor) = get_test_executor().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let result = executor
        .execute_scalar("SELECT pg_sleep(10)", &QueryParameters::new(), &cancel)
        .await;

    assert_eq!(result, Err(RawQueryError::Cancelled));

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_numeric_scalar_is_not_lost() {
    let Some(executor) = get_test_executor().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute_scalar(
            "SELECT sum(x) FROM (VALUES (1.5::numeric), (2.25)) AS t(x)",
            &QueryParameters::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.value, Some(ScalarValue::Json(json!("3.75"))));
    assert_eq!(result.declared_type, ScalarType::Json);

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_leftover_types_become_json() {
    let Some(executor) = get_test_executor().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let row = executor
        .execute_single(
            "SELECT DATE '2024-03-01' AS day, TIME '08:30:00' AS at, \
             ARRAY[1, 2]::int4[] AS ids, NULL::numeric AS missing",
            &QueryParameters::new(),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(row.get("day"), Some(&ScalarValue::Json(json!("2024-03-01"))));
    assert_eq!(row.get("at"), Some(&ScalarValue::Json(json!("08:30:00"))));
    assert_eq!(row.get("ids"), Some(&ScalarValue::Json(json!([1, 2]))));
    assert_eq!(row.get("missing"), Some(&ScalarValue::Null));

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_undecodable_value_is_encoding_failure() {
    let Some(executor) = get_test_executor().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = executor
        .execute_multiple(
            "SELECT '10.0.0.1'::inet AS addr",
            &QueryParameters::new(),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(RawQueryError::Encoding(_))));

    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_orchestrated_single_row() {
    let Some(executor) = get_test_executor().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let orchestrator = QueryOrchestrator::new(Arc::new(executor), Arc::new(AllowAllPolicy));

    let response = orchestrator
        .execute_single(
            &ExecuteRequest::new("SELECT $1::text AS greeting, 7 AS lucky")
                .with_parameters(r#"{"greeting": "hello"}"#),
            &CallerIdentity::new("tester", ["admin"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(!response.is_empty);
    assert_eq!(response.column_names, vec!["greeting", "lucky"]);
    assert_eq!(response.column_types, vec!["string", "int32"]);

    let row = decode_single_row(&response.row_bytes).unwrap().unwrap();
    assert_eq!(row.get("greeting"), Some(&ScalarValue::String("hello".into())));
}
