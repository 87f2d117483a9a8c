//! Query execution layer.
//!
//! Provides the trait the orchestrator executes queries through, allowing
//! different backends (and test doubles) to be used interchangeably.

mod mock;
mod postgres;
mod types;

pub use mock::MockExecutor;
pub use postgres::PostgresExecutor;
pub use types::{
    QueryParameters, RawResult, Row, ScalarResult, ScalarType, ScalarValue, TIMESTAMP_FORMAT,
};

use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Creates the Postgres-backed executor for the given configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn QueryExecutor>> {
    let executor = PostgresExecutor::connect(config).await?;
    Ok(Arc::new(executor))
}

/// Trait defining the execution interface.
///
/// Implementations own connection acquisition and release for the duration
/// of each call, bind `params` rather than splicing them into the text, and
/// return `RawQueryError::Cancelled` promptly once `cancel` fires.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes a query and returns the first column of the first row.
    async fn execute_scalar(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<ScalarResult>;

    /// Executes a query and returns its first row, if any.
    async fn execute_single(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<Option<Row>>;

    /// Executes a query and returns every row.
    async fn execute_multiple(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>>;

    /// Executes a statement and returns the number of affected rows.
    async fn execute_non_query(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<i64>;

    /// Releases any pooled resources.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
