//! Structured audit trail for one request.
//!
//! Every entry goes to the `audit` tracing target with the same identifying
//! fields so a request can be followed from receipt to final status.

use std::borrow::Cow;

use tracing::{info, warn};

use crate::error::{RawQueryError, Result};
use crate::rpc::CallerIdentity;
use crate::safety::StatementKind;

const ANONYMOUS: &str = "anonymous";

/// Audit context for a single request.
#[derive(Debug)]
pub struct RequestAudit<'a> {
    operation: &'static str,
    caller: &'a str,
    kind: StatementKind,
    table: Option<&'a str>,
    query: Cow<'a, str>,
}

impl<'a> RequestAudit<'a> {
    pub fn new(
        operation: &'static str,
        caller: &'a CallerIdentity,
        kind: StatementKind,
        table: Option<&'a str>,
        query: &'a str,
        max_query_chars: usize,
    ) -> Self {
        Self {
            operation,
            caller: caller.id.as_deref().unwrap_or(ANONYMOUS),
            kind,
            table,
            query: truncate_query(query, max_query_chars),
        }
    }

    pub fn received(&self) {
        info!(
            target: "audit",
            operation = self.operation,
            caller = self.caller,
            kind = %self.kind,
            table = self.table.unwrap_or("-"),
            query = %self.query,
            "Request received"
        );
    }

    pub fn authorized(&self) {
        info!(
            target: "audit",
            operation = self.operation,
            caller = self.caller,
            kind = %self.kind,
            table = self.table.unwrap_or("-"),
            outcome = "approved",
            "Authorization decided"
        );
    }

    /// Records a denial. `reason` stays in the log and never reaches the caller.
    pub fn denied(&self, reason: &str) {
        warn!(
            target: "audit",
            operation = self.operation,
            caller = self.caller,
            kind = %self.kind,
            table = self.table.unwrap_or("-"),
            query = %self.query,
            outcome = "denied",
            reason,
            "Authorization decided"
        );
    }

    pub fn executed<T>(&self, result: &Result<T>) {
        match result {
            Ok(_) => info!(
                target: "audit",
                operation = self.operation,
                caller = self.caller,
                outcome = "ok",
                "Execution finished"
            ),
            Err(e) => warn!(
                target: "audit",
                operation = self.operation,
                caller = self.caller,
                kind = %self.kind,
                table = self.table.unwrap_or("-"),
                query = %self.query,
                outcome = "failed",
                category = e.category(),
                error = %e,
                "Execution finished"
            ),
        }
    }

    /// Records the final status. Failures carry the full request context.
    pub fn finished<T>(&self, result: &Result<T>) {
        match result {
            Ok(_) => info!(
                target: "audit",
                operation = self.operation,
                caller = self.caller,
                status = "OK",
                "Request completed"
            ),
            Err(e) => warn!(
                target: "audit",
                operation = self.operation,
                caller = self.caller,
                kind = %self.kind,
                table = self.table.unwrap_or("-"),
                query = %self.query,
                status = status_name(e),
                category = e.category(),
                error = %e,
                "Request completed"
            ),
        }
    }
}

fn status_name(error: &RawQueryError) -> &'static str {
    match error {
        RawQueryError::AuthorizationDenied(_) => "PERMISSION_DENIED",
        RawQueryError::MalformedParameters(_) => "INVALID_ARGUMENT",
        RawQueryError::Cancelled => "CANCELLED",
        _ => "INTERNAL",
    }
}

/// Truncates query text to `max_chars` characters, marking the cut.
pub fn truncate_query(query: &str, max_chars: usize) -> Cow<'_, str> {
    match query.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}…", &query[..cut])),
        None => Cow::Borrowed(query),
    }
}
