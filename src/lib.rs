//! db-rawquery - policy-gated raw SQL execution over gRPC.
//!
//! This library exposes the core modules for use by the `rawqueryd` binary
//! and integration tests.

pub mod cli;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod policy;
pub mod query;
pub mod rpc;
pub mod safety;
