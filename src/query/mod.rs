//! Request orchestration for the raw query service.
//!
//! Isolates the authorize-execute-encode sequence from the RPC transport so
//! it can be driven directly in tests.

mod audit;
mod orchestrator;

pub use audit::truncate_query;
pub use orchestrator::{parse_parameters, QueryOrchestrator};
