//! Query execution with authorization.
//!
//! Sequences each request through risk scan, classification, policy check,
//! parameter parsing, execution and encoding. No state survives a request.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::audit::RequestAudit;
use crate::codec::{encode_row_set, encode_scalar, encode_single_row, extract_column_info};
use crate::config::AuditConfig;
use crate::db::{QueryExecutor, QueryParameters};
use crate::error::{RawQueryError, Result};
use crate::policy::{AuthorizationContext, QueryPolicy};
use crate::rpc::{
    CallerIdentity, ExecuteRequest, NonQueryResponse, RowSetResponse, ScalarResponse,
    SingleRowResponse,
};
use crate::safety::{classify, extract_table_name, has_suspicious_pattern};

/// The RPC-facing core: authorizes, executes and encodes raw queries.
pub struct QueryOrchestrator {
    executor: Arc<dyn QueryExecutor>,
    policy: Arc<dyn QueryPolicy>,
    database_name: Option<String>,
    audit: AuditConfig,
}

impl QueryOrchestrator {
    /// Creates an orchestrator over the given executor and policy.
    pub fn new(executor: Arc<dyn QueryExecutor>, policy: Arc<dyn QueryPolicy>) -> Self {
        Self {
            executor,
            policy,
            database_name: None,
            audit: AuditConfig::default(),
        }
    }

    /// Sets the database name exposed to policies.
    pub fn with_database_name(mut self, name: Option<String>) -> Self {
        self.database_name = name;
        self
    }

    /// Sets audit logging options.
    pub fn with_audit(mut self, audit: AuditConfig) -> Self {
        self.audit = audit;
        self
    }

    pub async fn execute_scalar(
        &self,
        request: &ExecuteRequest,
        caller: &CallerIdentity,
        cancel: &CancellationToken,
    ) -> Result<ScalarResponse> {
        let table = extract_table_name(&request.query);
        let audit = self.audit_for("ExecuteScalar", request, caller, table.as_deref());

        let result: Result<ScalarResponse> = async {
            let params = self.authorize(&audit, request, caller, table.as_deref(), cancel).await?;
            let scalar = self
                .executor
                .execute_scalar(&request.query, &params, cancel)
                .await
                .map_err(execution_failure);
            audit.executed(&scalar);
            let scalar = scalar?;

            let value = scalar.value.filter(|v| !v.is_null());
            let type_name = value
                .as_ref()
                .map(|v| v.scalar_type())
                .unwrap_or(scalar.declared_type)
                .name()
                .to_string();
            Ok(ScalarResponse {
                value: encode_scalar(value.as_ref())?,
                type_name,
                is_null: value.is_none(),
            })
        }
        .await;

        audit.finished(&result);
        result
    }

    pub async fn execute_single(
        &self,
        request: &ExecuteRequest,
        caller: &CallerIdentity,
        cancel: &CancellationToken,
    ) -> Result<SingleRowResponse> {
        let table = extract_table_name(&request.query);
        let audit = self.audit_for("ExecuteSingle", request, caller, table.as_deref());

        let result: Result<SingleRowResponse> = async {
            let params = self.authorize(&audit, request, caller, table.as_deref(), cancel).await?;
            let row = self
                .executor
                .execute_single(&request.query, &params, cancel)
                .await
                .map_err(execution_failure);
            audit.executed(&row);
            let row = row?;

            let (column_names, column_types) = extract_column_info(row.as_ref());
            Ok(SingleRowResponse {
                row_bytes: encode_single_row(row.as_ref())?,
                column_names,
                column_types,
                is_empty: row.is_none(),
            })
        }
        .await;

        audit.finished(&result);
        result
    }

    pub async fn execute_multiple(
        &self,
        request: &ExecuteRequest,
        caller: &CallerIdentity,
        cancel: &CancellationToken,
    ) -> Result<RowSetResponse> {
        let table = extract_table_name(&request.query);
        let audit = self.audit_for("ExecuteMultiple", request, caller, table.as_deref());

        let result: Result<RowSetResponse> = async {
            let params = self.authorize(&audit, request, caller, table.as_deref(), cancel).await?;
            let rows = self
                .executor
                .execute_multiple(&request.query, &params, cancel)
                .await
                .map_err(execution_failure);
            audit.executed(&rows);
            let rows = rows?;

            // Column metadata comes from the first row; an empty set has none.
            let (column_names, column_types) = extract_column_info(rows.first());
            Ok(RowSetResponse {
                rows_bytes: encode_row_set(&rows)?,
                column_names,
                column_types,
                row_count: to_wire_count(rows.len(), "Row count")?,
            })
        }
        .await;

        audit.finished(&result);
        result
    }

    pub async fn execute_non_query(
        &self,
        request: &ExecuteRequest,
        caller: &CallerIdentity,
        cancel: &CancellationToken,
    ) -> Result<NonQueryResponse> {
        let table = extract_table_name(&request.query);
        let audit = self.audit_for("ExecuteNonQuery", request, caller, table.as_deref());

        let result: Result<NonQueryResponse> = async {
            let params = self.authorize(&audit, request, caller, table.as_deref(), cancel).await?;
            let affected = self
                .executor
                .execute_non_query(&request.query, &params, cancel)
                .await
                .map_err(execution_failure);
            audit.executed(&affected);
            let affected = affected?;

            Ok(NonQueryResponse {
                rows_affected: to_wire_count(affected, "Affected row count")?,
            })
        }
        .await;

        audit.finished(&result);
        result
    }

    fn audit_for<'a>(
        &self,
        operation: &'static str,
        request: &'a ExecuteRequest,
        caller: &'a CallerIdentity,
        table: Option<&'a str>,
    ) -> RequestAudit<'a> {
        let audit = RequestAudit::new(
            operation,
            caller,
            classify(request.query.as_str()),
            table,
            &request.query,
            self.audit.max_query_chars,
        );
        audit.received();
        audit
    }

    /// Runs the risk scan and policy check, then parses parameters.
    ///
    /// Everything here happens before the executor is touched. A policy error
    /// is a denial.
    async fn authorize(
        &self,
        audit: &RequestAudit<'_>,
        request: &ExecuteRequest,
        caller: &CallerIdentity,
        table: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<QueryParameters> {
        let query = request.query.as_str();

        if has_suspicious_pattern(query) {
            audit.denied("suspicious pattern");
            return Err(RawQueryError::denied("query matched a suspicious pattern"));
        }

        let context = AuthorizationContext {
            query_text: query.to_string(),
            kind: classify(query),
            table_name: table.map(String::from),
            caller_id: caller.id.clone(),
            caller_roles: caller.roles.clone(),
            database_name: self.database_name.clone(),
        };

        let decision = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(RawQueryError::Cancelled),
            decision = self.policy.can_execute(&context) => decision,
        };

        match decision {
            Ok(true) => audit.authorized(),
            Ok(false) => {
                audit.denied("policy rejected");
                return Err(RawQueryError::denied(format!(
                    "policy rejected {} statement",
                    context.kind
                )));
            }
            Err(e) => {
                warn!(error = %e, "Policy evaluation failed, denying");
                audit.denied("policy error");
                return Err(RawQueryError::denied(format!("policy error: {e}")));
            }
        }

        let params = parse_parameters(request.parameters_json.as_deref())?;

        if cancel.is_cancelled() {
            return Err(RawQueryError::Cancelled);
        }
        Ok(params)
    }
}

/// Parses the optional parameter payload. Absent, blank or `null` is empty.
pub fn parse_parameters(json: Option<&str>) -> Result<QueryParameters> {
    let Some(json) = json.filter(|j| !j.trim().is_empty()) else {
        return Ok(QueryParameters::new());
    };

    match serde_json::from_str(json) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(serde_json::Value::Null) => Ok(QueryParameters::new()),
        Ok(_) => Err(RawQueryError::malformed(
            "Parameters must be a JSON object",
        )),
        Err(e) => Err(RawQueryError::malformed(format!(
            "Invalid parameters JSON: {e}"
        ))),
    }
}

/// Executor errors surface as execution failures, except denials raised by
/// the executor itself, cancellation and values that could not be decoded.
fn execution_failure(error: RawQueryError) -> RawQueryError {
    match error {
        RawQueryError::AuthorizationDenied(_)
        | RawQueryError::Cancelled
        | RawQueryError::Execution(_)
        | RawQueryError::Encoding(_) => error,
        other => RawQueryError::execution(other.to_string()),
    }
}

fn to_wire_count<N>(count: N, what: &str) -> Result<i32>
where
    N: TryInto<i32> + Copy + std::fmt::Display,
{
    count
        .try_into()
        .map_err(|_| RawQueryError::encoding(format!("{what} {count} exceeds the wire range")))
}
