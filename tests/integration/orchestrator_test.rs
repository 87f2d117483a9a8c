//! End-to-end orchestrator scenarios against the mock executor.

use std::sync::Arc;
use std::time::Duration;

use db_rawquery::codec::{decode_row_set, decode_scalar, decode_single_row};
use db_rawquery::config::PolicyConfig;
use db_rawquery::db::{MockExecutor, Row, ScalarResult, ScalarValue};
use db_rawquery::error::RawQueryError;
use async_trait::async_trait;
use db_rawquery::error::Result;
use db_rawquery::policy::{
    self, AllowListPolicy, AuthorizationContext, DenyAllPolicy, PolicyKind, QueryPolicy,
};
use db_rawquery::query::QueryOrchestrator;
use db_rawquery::rpc::{CallerIdentity, ExecuteRequest};
use db_rawquery::safety::StatementKind;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn orders() -> Vec<Row> {
    vec![
        Row::new()
            .with("id", 1i32)
            .with("customer", "ada")
            .with("total", 12.5),
        Row::new()
            .with("id", 2i32)
            .with("customer", "grace")
            .with("total", 40.0),
    ]
}

fn reader() -> CallerIdentity {
    CallerIdentity::new("alice", ["reader"])
}

fn default_policy_orchestrator(mock: Arc<MockExecutor>) -> QueryOrchestrator {
    QueryOrchestrator::new(mock, policy::from_config(&PolicyConfig::default()))
}

#[tokio::test]
async fn test_reader_selects_orders() {
    let mock = Arc::new(MockExecutor::new().with_rows(orders()));
    let orchestrator = default_policy_orchestrator(mock.clone());

    let response = orchestrator
        .execute_multiple(
            &ExecuteRequest::new("SELECT * FROM Orders"),
            &reader(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.row_count, 2);
    assert_eq!(response.column_names, vec!["id", "customer", "total"]);
    assert_eq!(response.column_types, vec!["int32", "string", "float64"]);

    let rows = decode_row_set(&response.rows_bytes).unwrap();
    assert_eq!(rows.len(), 2);
    let names: Vec<&str> = rows[1].names().collect();
    assert_eq!(names, vec!["id", "customer", "total"]);
    assert_eq!(
        rows[1].get("customer"),
        Some(&ScalarValue::String("grace".into()))
    );
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_delete_denied_under_default_policy() {
    let mock = Arc::new(MockExecutor::new().with_affected(10));
    let orchestrator = default_policy_orchestrator(mock.clone());

    let result = orchestrator
        .execute_non_query(
            &ExecuteRequest::new("DELETE FROM Orders"),
            &reader(),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(RawQueryError::AuthorizationDenied(_))));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_unknown_kind_denied_under_default_policy() {
    let mock = Arc::new(MockExecutor::new());
    let orchestrator = default_policy_orchestrator(mock.clone());

    let result = orchestrator
        .execute_multiple(
            &ExecuteRequest::new("WITH x AS (SELECT 1) SELECT * FROM x"),
            &reader(),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(RawQueryError::AuthorizationDenied(_))));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_union_injection_denied_before_policy() {
    let mock = Arc::new(MockExecutor::new());
    let allow_all = PolicyConfig {
        kind: PolicyKind::AllowAll,
        ..PolicyConfig::default()
    };
    let orchestrator = QueryOrchestrator::new(mock.clone(), policy::from_config(&allow_all));

    let result = orchestrator
        .execute_multiple(
            &ExecuteRequest::new("SELECT name FROM users UNION SELECT password FROM admins"),
            &reader(),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(RawQueryError::AuthorizationDenied(_))));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_deny_all_blocks_select() {
    let mock = Arc::new(MockExecutor::new());
    let orchestrator = QueryOrchestrator::new(mock.clone(), Arc::new(DenyAllPolicy));

    let result = orchestrator
        .execute_scalar(
            &ExecuteRequest::new("SELECT 1"),
            &reader(),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(RawQueryError::AuthorizationDenied(_))));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_allow_list_scopes_tables_and_roles() {
    let mock = Arc::new(MockExecutor::new().with_rows(orders()));
    let policy = AllowListPolicy::new()
        .with_kinds([StatementKind::Select, StatementKind::Update])
        .with_roles(["reader"])
        .with_tables(["orders", "public.orders"]);
    let orchestrator = QueryOrchestrator::new(mock.clone(), Arc::new(policy));
    let cancel = CancellationToken::new();

    let allowed = orchestrator
        .execute_multiple(&ExecuteRequest::new("SELECT * FROM public.orders"), &reader(), &cancel)
        .await;
    assert!(allowed.is_ok());

    let other_table = orchestrator
        .execute_multiple(&ExecuteRequest::new("SELECT * FROM payroll"), &reader(), &cancel)
        .await;
    assert!(matches!(other_table, Err(RawQueryError::AuthorizationDenied(_))));

    let other_schema = orchestrator
        .execute_multiple(&ExecuteRequest::new("SELECT * FROM secret.orders"), &reader(), &cancel)
        .await;
    assert!(matches!(other_schema, Err(RawQueryError::AuthorizationDenied(_))));

    let anonymous = orchestrator
        .execute_multiple(
            &ExecuteRequest::new("SELECT * FROM orders"),
            &CallerIdentity::anonymous(),
            &cancel,
        )
        .await;
    assert!(matches!(anonymous, Err(RawQueryError::AuthorizationDenied(_))));

    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_single_row_round_trip() {
    let mock = Arc::new(MockExecutor::new().with_single(orders().into_iter().next()));
    let orchestrator = default_policy_orchestrator(mock.clone());

    let response = orchestrator
        .execute_single(
            &ExecuteRequest::new("SELECT * FROM orders WHERE id = $1")
                .with_parameters(r#"{"id": 1}"#),
            &reader(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let row = decode_single_row(&response.row_bytes).unwrap().unwrap();
    assert_eq!(row.get("id"), Some(&ScalarValue::Int64(1)));
    assert_eq!(response.column_types[0], "int32");

    let params = mock.last_parameters().unwrap();
    assert_eq!(params.get("id"), Some(&serde_json::json!(1)));
}

#[tokio::test]
async fn test_scalar_count() {
    let mock = Arc::new(MockExecutor::new().with_scalar(ScalarResult::of(7i64)));
    let orchestrator = default_policy_orchestrator(mock);

    let response = orchestrator
        .execute_scalar(
            &ExecuteRequest::new("SELECT count(*) FROM orders"),
            &reader(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        decode_scalar(&response.value, &response.type_name).unwrap(),
        ScalarValue::Int64(7)
    );
}

#[tokio::test]
async fn test_malformed_parameters_rejected_without_execution() {
    let mock = Arc::new(MockExecutor::new());
    let orchestrator = default_policy_orchestrator(mock.clone());

    let result = orchestrator
        .execute_multiple(
            &ExecuteRequest::new("SELECT * FROM orders WHERE id = $1")
                .with_parameters(r#"{"id": 1"#),
            &reader(),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(RawQueryError::MalformedParameters(_))));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_cancellation_reaches_executor() {
    let mock = Arc::new(MockExecutor::new().hanging());
    let orchestrator = Arc::new(default_policy_orchestrator(mock.clone()));
    let cancel = CancellationToken::new();

    let task = {
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            orchestrator
                .execute_multiple(&ExecuteRequest::new("SELECT * FROM orders"), &reader(), &cancel)
                .await
        })
    };

    // Let the request reach the executor before cancelling.
    while mock.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("cancelled request should finish")
        .unwrap();

    assert_eq!(result, Err(RawQueryError::Cancelled));
    assert_eq!(mock.cancellations(), 1);
}

/// Policy that takes far longer than any test waits.
struct SlowPolicy;

#[async_trait]
impl QueryPolicy for SlowPolicy {
    async fn can_execute(&self, _context: &AuthorizationContext) -> Result<bool> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(true)
    }
}

#[tokio::test]
async fn test_cancellation_during_policy_check() {
    let mock = Arc::new(MockExecutor::new().with_rows(orders()));
    let orchestrator = Arc::new(QueryOrchestrator::new(mock.clone(), Arc::new(SlowPolicy)));
    let cancel = CancellationToken::new();

    let task = {
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            orchestrator
                .execute_multiple(&ExecuteRequest::new("SELECT * FROM orders"), &reader(), &cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("cancel should interrupt the policy check")
        .unwrap();

    assert_eq!(result, Err(RawQueryError::Cancelled));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_independent_requests_do_not_share_state() {
    let mock = Arc::new(MockExecutor::new());
    let orchestrator = default_policy_orchestrator(mock.clone());
    let cancel = CancellationToken::new();

    let denied = orchestrator
        .execute_non_query(&ExecuteRequest::new("DROP TABLE orders"), &reader(), &cancel)
        .await;
    assert!(denied.is_err());

    let allowed = orchestrator
        .execute_multiple(&ExecuteRequest::new("SELECT * FROM orders"), &reader(), &cancel)
        .await
        .unwrap();
    assert_eq!(allowed.column_names, vec!["result"]);
    assert_eq!(mock.calls(), 1);
}
