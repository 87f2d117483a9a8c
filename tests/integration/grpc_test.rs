//! gRPC round trips through a real tonic server backed by the mock executor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use db_rawquery::codec::decode_row_set;
use db_rawquery::db::{MockExecutor, Row};
use db_rawquery::error::DENIED_MESSAGE;
use db_rawquery::policy::AllowListPolicy;
use db_rawquery::query::QueryOrchestrator;
use db_rawquery::rpc::{
    ExecuteRequest, RawQueryClient, RawQueryService, CALLER_ID_HEADER, CALLER_ROLES_HEADER,
};
use db_rawquery::safety::StatementKind;
use tokio::sync::oneshot;
use tonic::transport::Channel;
use tonic::{Code, Request};

struct TestServer {
    client: RawQueryClient<Channel>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn free_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn start_server(mock: Arc<MockExecutor>, trust_identity_headers: bool) -> TestServer {
    let policy = AllowListPolicy::new()
        .with_kinds([StatementKind::Select, StatementKind::Insert])
        .with_roles(["analyst"]);
    let orchestrator = QueryOrchestrator::new(mock, Arc::new(policy));
    let service = RawQueryService::new(Arc::new(orchestrator));

    let addr = free_addr().await;
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = service
            .serve(addr, trust_identity_headers, async {
                let _ = rx.await;
            })
            .await;
    });

    let endpoint = format!("http://{addr}");
    for _ in 0..50 {
        if let Ok(client) = RawQueryClient::connect(endpoint.clone()).await {
            return TestServer {
                client,
                shutdown: Some(tx),
            };
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gRPC server did not start on {addr}");
}

fn as_caller(query: &str, id: &str, roles: &str) -> Request<ExecuteRequest> {
    let mut request = Request::new(ExecuteRequest::new(query));
    request
        .metadata_mut()
        .insert(CALLER_ID_HEADER, id.parse().unwrap());
    request
        .metadata_mut()
        .insert(CALLER_ROLES_HEADER, roles.parse().unwrap());
    request
}

#[tokio::test]
async fn test_trusted_headers_authorize_caller() {
    let rows = vec![Row::new().with("region", "emea").with("revenue", 1200i64)];
    let mock = Arc::new(MockExecutor::new().with_rows(rows));
    let mut server = start_server(mock.clone(), true).await;

    let response = server
        .client
        .execute_multiple(as_caller("SELECT * FROM sales", "carol", "analyst"))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.row_count, 1);
    assert_eq!(response.column_names, vec!["region", "revenue"]);
    assert_eq!(response.column_types, vec!["string", "int64"]);
    assert_eq!(decode_row_set(&response.rows_bytes).unwrap().len(), 1);
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_untrusted_headers_are_ignored() {
    let mock = Arc::new(MockExecutor::new());
    let mut server = start_server(mock.clone(), false).await;

    let status = server
        .client
        .execute_multiple(as_caller("SELECT * FROM sales", "carol", "analyst"))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::PermissionDenied);
    assert_eq!(status.message(), DENIED_MESSAGE);
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_status_codes_over_the_wire() {
    let mock = Arc::new(MockExecutor::new().with_affected(1));
    let mut server = start_server(mock.clone(), true).await;

    let denied = server
        .client
        .execute_non_query(as_caller("DELETE FROM sales", "carol", "analyst"))
        .await
        .unwrap_err();
    assert_eq!(denied.code(), Code::PermissionDenied);

    let mut malformed = as_caller("INSERT INTO sales VALUES ($1)", "carol", "analyst");
    malformed.get_mut().parameters_json = Some("\"not an object\"".to_string());
    let malformed = server
        .client
        .execute_non_query(malformed)
        .await
        .unwrap_err();
    assert_eq!(malformed.code(), Code::InvalidArgument);

    let mut insert = as_caller("INSERT INTO sales VALUES ($1)", "carol", "analyst");
    insert.get_mut().parameters_json = Some(r#"{"amount": 10}"#.to_string());
    let inserted = server
        .client
        .execute_non_query(insert)
        .await
        .unwrap()
        .into_inner();
    assert_eq!(inserted.rows_affected, 1);
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_scalar_null_over_the_wire() {
    let mock = Arc::new(
        MockExecutor::new().with_scalar(db_rawquery::db::ScalarResult::null(
            db_rawquery::db::ScalarType::Float64,
        )),
    );
    let mut server = start_server(mock, true).await;

    let response = server
        .client
        .execute_scalar(as_caller("SELECT avg(revenue) FROM sales", "carol", "analyst"))
        .await
        .unwrap()
        .into_inner();

    assert!(response.is_null);
    assert!(response.value.is_empty());
    assert_eq!(response.type_name, "float64");
}
