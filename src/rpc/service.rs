//! gRPC service implementation for raw query execution.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::info;

use super::generated::raw_query_server::{RawQuery, RawQueryServer};
use super::identity::{identity_interceptor, CallerIdentity};
use super::messages::{
    ExecuteRequest, NonQueryResponse, RowSetResponse, ScalarResponse, SingleRowResponse,
};
use crate::error::RawQueryError;
use crate::query::QueryOrchestrator;

/// gRPC service that delegates every call to the [`QueryOrchestrator`].
#[derive(Clone)]
pub struct RawQueryService {
    orchestrator: Arc<QueryOrchestrator>,
}

impl RawQueryService {
    /// Creates a new service.
    pub fn new(orchestrator: Arc<QueryOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Serves the service on `addr` until `shutdown` resolves.
    ///
    /// With `trust_identity_headers`, caller identity is lifted from request
    /// metadata; otherwise only identity set by an outer layer is seen.
    pub async fn serve(
        self,
        addr: SocketAddr,
        trust_identity_headers: bool,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), tonic::transport::Error> {
        let server = RawQueryServer::with_interceptor(self, move |request: Request<()>| {
            if trust_identity_headers {
                identity_interceptor(request)
            } else {
                Ok(request)
            }
        });

        info!("Raw query gRPC server listening on {}", addr);

        tonic::transport::Server::builder()
            .add_service(server)
            .serve_with_shutdown(addr, shutdown)
            .await
    }
}

/// Splits a tonic request into the caller identity and the message.
///
/// The returned token is cancelled when its guard drops, which happens when
/// tonic drops the handler future on client disconnect or deadline.
fn prepare<T>(request: Request<T>) -> (CallerIdentity, T, CancellationToken) {
    let caller = CallerIdentity::from_request(&request);
    (caller, request.into_inner(), CancellationToken::new())
}

fn respond<T>(result: Result<T, RawQueryError>) -> Result<Response<T>, Status> {
    result.map(Response::new).map_err(Status::from)
}

#[tonic::async_trait]
impl RawQuery for RawQueryService {
    async fn execute_scalar(
        &self,
        request: Request<ExecuteRequest>,
    ) -> Result<Response<ScalarResponse>, Status> {
        let (caller, req, cancel) = prepare(request);
        let _guard = cancel.clone().drop_guard();
        respond(self.orchestrator.execute_scalar(&req, &caller, &cancel).await)
    }

    async fn execute_single(
        &self,
        request: Request<ExecuteRequest>,
    ) -> Result<Response<SingleRowResponse>, Status> {
        let (caller, req, cancel) = prepare(request);
        let _guard = cancel.clone().drop_guard();
        respond(self.orchestrator.execute_single(&req, &caller, &cancel).await)
    }

    async fn execute_multiple(
        &self,
        request: Request<ExecuteRequest>,
    ) -> Result<Response<RowSetResponse>, Status> {
        let (caller, req, cancel) = prepare(request);
        let _guard = cancel.clone().drop_guard();
        respond(self.orchestrator.execute_multiple(&req, &caller, &cancel).await)
    }

    async fn execute_non_query(
        &self,
        request: Request<ExecuteRequest>,
    ) -> Result<Response<NonQueryResponse>, Status> {
        let (caller, req, cancel) = prepare(request);
        let _guard = cancel.clone().drop_guard();
        respond(self.orchestrator.execute_non_query(&req, &caller, &cancel).await)
    }
}
