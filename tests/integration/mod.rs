//! Integration tests for db-rawquery.

pub mod grpc_test;
pub mod orchestrator_test;
pub mod postgres_test;
