//! Role and table allow-list policy.

use async_trait::async_trait;
use tracing::debug;

use super::{AuthorizationContext, QueryPolicy};
use crate::config::PolicyConfig;
use crate::error::Result;
use crate::safety::StatementKind;

/// Approves a query only if every configured list admits it.
///
/// - `allowed_kinds`: statement kinds that may run (default SELECT only).
/// - `allowed_roles`: caller must hold at least one; empty means any caller,
///   anonymous included.
/// - `allowed_tables`: extracted table must be listed; empty means any table.
///   A query whose table could not be extracted is denied when this list is set.
///   Names compare case-insensitively and exactly: `orders` admits only an
///   unqualified `orders`, so a schema-qualified table must be listed qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowListPolicy {
    allowed_kinds: Vec<StatementKind>,
    allowed_roles: Vec<String>,
    allowed_tables: Vec<String>,
}

impl Default for AllowListPolicy {
    fn default() -> Self {
        Self {
            allowed_kinds: vec![StatementKind::Select],
            allowed_roles: Vec::new(),
            allowed_tables: Vec::new(),
        }
    }
}

impl AllowListPolicy {
    /// Creates a policy admitting only SELECT, for any caller and table.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            allowed_kinds: config.allowed_kinds.clone(),
            allowed_roles: config.allowed_roles.clone(),
            allowed_tables: config.allowed_tables.clone(),
        }
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = StatementKind>) -> Self {
        self.allowed_kinds = kinds.into_iter().collect();
        self
    }

    pub fn with_roles<S: Into<String>>(mut self, roles: impl IntoIterator<Item = S>) -> Self {
        self.allowed_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tables<S: Into<String>>(mut self, tables: impl IntoIterator<Item = S>) -> Self {
        self.allowed_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    fn table_allowed(&self, table: Option<&str>) -> bool {
        if self.allowed_tables.is_empty() {
            return true;
        }
        let Some(table) = table else {
            return false;
        };
        self.allowed_tables
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(table))
    }
}

#[async_trait]
impl QueryPolicy for AllowListPolicy {
    async fn can_execute(&self, ctx: &AuthorizationContext) -> Result<bool> {
        if !self.allowed_kinds.contains(&ctx.kind) {
            debug!(kind = %ctx.kind, "Statement kind not in allow-list");
            return Ok(false);
        }

        if !self.allowed_roles.is_empty()
            && !self.allowed_roles.iter().any(|role| ctx.has_role(role))
        {
            debug!(caller = ?ctx.caller_id, "Caller holds no allowed role");
            return Ok(false);
        }

        if !self.table_allowed(ctx.table_name.as_deref()) {
            debug!(table = ?ctx.table_name, "Table not in allow-list");
            return Ok(false);
        }

        Ok(true)
    }
}
