//! Mock executor for testing.
//!
//! Returns canned results and records how it was called, so tests can assert
//! that denied requests never reach execution and that cancellation is seen.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{QueryExecutor, QueryParameters, RawResult, Row, ScalarResult};
use crate::error::{RawQueryError, Result};

/// A mock executor that returns predefined results.
#[derive(Debug, Default)]
pub struct MockExecutor {
    scalar: Option<ScalarResult>,
    single: Option<Option<Row>>,
    rows: Option<Vec<Row>>,
    affected: i64,
    failure: Option<RawQueryError>,
    delay: Option<Duration>,
    hang_until_cancelled: bool,
    calls: AtomicUsize,
    cancellations: AtomicUsize,
    last_sql: Mutex<Option<String>>,
    last_parameters: Mutex<Option<QueryParameters>>,
}

impl MockExecutor {
    /// Creates a mock that echoes the query back in a single `result` column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the result returned by `execute_scalar`.
    pub fn with_scalar(mut self, scalar: ScalarResult) -> Self {
        self.scalar = Some(scalar);
        self
    }

    /// Sets the result returned by `execute_single`.
    pub fn with_single(mut self, row: Option<Row>) -> Self {
        self.single = Some(row);
        self
    }

    /// Sets the rows returned by `execute_multiple`.
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Sets the count returned by `execute_non_query`.
    pub fn with_affected(mut self, affected: i64) -> Self {
        self.affected = affected;
        self
    }

    /// Sets the canned result for whichever operation `result` belongs to.
    pub fn with_result(self, result: RawResult) -> Self {
        match result {
            RawResult::Scalar(scalar) => self.with_scalar(scalar),
            RawResult::SingleRow(row) => self.with_single(row),
            RawResult::RowSet(rows) => self.with_rows(rows),
            RawResult::AffectedCount(n) => self.with_affected(n),
        }
    }

    /// Makes every call fail with the given error.
    pub fn with_failure(mut self, error: RawQueryError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Delays every call, returning early if cancelled.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Blocks every call until its cancellation token fires.
    pub fn hanging(mut self) -> Self {
        self.hang_until_cancelled = true;
        self
    }

    /// Number of execute calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of calls that observed cancellation.
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// The query text of the most recent call.
    pub fn last_sql(&self) -> Option<String> {
        self.last_sql.lock().ok().and_then(|guard| guard.clone())
    }

    /// The parameters of the most recent call.
    pub fn last_parameters(&self) -> Option<QueryParameters> {
        self.last_parameters
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    fn echo_row(sql: &str) -> Row {
        Row::new().with("result", format!("Mock result for: {sql}"))
    }

    /// Records the call, then waits, fails or produces a result.
    async fn respond<T>(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
        produce: impl FnOnce() -> T,
    ) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_sql.lock() {
            *guard = Some(sql.to_string());
        }
        if let Ok(mut guard) = self.last_parameters.lock() {
            *guard = Some(params.clone());
        }

        if self.hang_until_cancelled {
            cancel.cancelled().await;
            self.cancellations.fetch_add(1, Ordering::SeqCst);
            return Err(RawQueryError::Cancelled);
        }

        if let Some(delay) = self.delay {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    self.cancellations.fetch_add(1, Ordering::SeqCst);
                    return Err(RawQueryError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        Ok(produce())
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute_scalar(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<ScalarResult> {
        self.respond(sql, params, cancel, || {
            self.scalar
                .clone()
                .unwrap_or_else(|| ScalarResult::of(format!("Mock result for: {sql}")))
        })
        .await
    }

    async fn execute_single(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<Option<Row>> {
        self.respond(sql, params, cancel, || {
            self.single
                .clone()
                .unwrap_or_else(|| Some(Self::echo_row(sql)))
        })
        .await
    }

    async fn execute_multiple(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>> {
        self.respond(sql, params, cancel, || {
            self.rows
                .clone()
                .unwrap_or_else(|| vec![Self::echo_row(sql)])
        })
        .await
    }

    async fn execute_non_query(
        &self,
        sql: &str,
        params: &QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<i64> {
        self.respond(sql, params, cancel, || self.affected).await
    }
}
