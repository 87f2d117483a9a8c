//! Authorization policies for raw query execution.
//!
//! A policy sees an immutable [`AuthorizationContext`] and answers yes or no.
//! Errors are treated as denials by the orchestrator.

mod allow_list;

pub use allow_list::AllowListPolicy;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;
use crate::error::Result;
use crate::safety::StatementKind;

/// Facts about one request that a policy evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthorizationContext {
    pub query_text: String,
    pub kind: StatementKind,
    pub table_name: Option<String>,
    pub caller_id: Option<String>,
    pub caller_roles: Vec<String>,
    pub database_name: Option<String>,
}

impl AuthorizationContext {
    /// Returns true if the caller holds `role` (case-insensitive).
    pub fn has_role(&self, role: &str) -> bool {
        self.caller_roles
            .iter()
            .any(|held| held.eq_ignore_ascii_case(role))
    }
}

/// Decides whether a query may be executed.
#[async_trait]
pub trait QueryPolicy: Send + Sync {
    /// Returns `Ok(true)` to approve. `Ok(false)` and `Err(_)` both deny.
    async fn can_execute(&self, ctx: &AuthorizationContext) -> Result<bool>;
}

/// Approves everything. For trusted, internal-only deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPolicy;

#[async_trait]
impl QueryPolicy for AllowAllPolicy {
    async fn can_execute(&self, _ctx: &AuthorizationContext) -> Result<bool> {
        Ok(true)
    }
}

/// Denies everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllPolicy;

#[async_trait]
impl QueryPolicy for DenyAllPolicy {
    async fn can_execute(&self, _ctx: &AuthorizationContext) -> Result<bool> {
        Ok(false)
    }
}

/// The default policy: SELECT only, regardless of who is asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyPolicy;

#[async_trait]
impl QueryPolicy for ReadOnlyPolicy {
    async fn can_execute(&self, ctx: &AuthorizationContext) -> Result<bool> {
        Ok(ctx.kind.is_read_only())
    }
}

/// Built-in policy selection, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    #[default]
    ReadsOnly,
    AllowAll,
    DenyAll,
    AllowList,
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reads-only" | "read-only" | "default" => Ok(Self::ReadsOnly),
            "allow-all" => Ok(Self::AllowAll),
            "deny-all" => Ok(Self::DenyAll),
            "allow-list" => Ok(Self::AllowList),
            _ => Err(format!(
                "Invalid policy: {s}. Expected: reads-only, allow-all, deny-all, or allow-list"
            )),
        }
    }
}

/// Builds the configured policy.
pub fn from_config(config: &PolicyConfig) -> Arc<dyn QueryPolicy> {
    match config.kind {
        PolicyKind::ReadsOnly => Arc::new(ReadOnlyPolicy),
        PolicyKind::AllowAll => Arc::new(AllowAllPolicy),
        PolicyKind::DenyAll => Arc::new(DenyAllPolicy),
        PolicyKind::AllowList => Arc::new(AllowListPolicy::from_config(config)),
    }
}
