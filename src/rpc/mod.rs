//! gRPC surface of the raw query service.
//!
//! The service stub is generated at build time from a hand-declared service
//! definition; messages are plain `prost` structs.

mod identity;
mod messages;
mod service;

pub use identity::{identity_interceptor, CallerIdentity, CALLER_ID_HEADER, CALLER_ROLES_HEADER};
pub use messages::{
    ExecuteRequest, NonQueryResponse, RowSetResponse, ScalarResponse, SingleRowResponse,
};
pub use service::RawQueryService;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/rawquery.RawQuery.rs"));
}

pub use generated::raw_query_client::RawQueryClient;
pub use generated::raw_query_server::{RawQuery, RawQueryServer};
