//! Caller identity as seen by the transport.
//!
//! An authentication layer in front of the service stores a [`CallerIdentity`]
//! in the request extensions. Absent identity means an anonymous caller, which
//! policies are free to deny; it is never a transport error.

use tonic::metadata::MetadataMap;
use tonic::{Request, Status};

/// Metadata key carrying the caller id, when identity headers are trusted.
pub const CALLER_ID_HEADER: &str = "x-caller-id";

/// Metadata key carrying comma-separated caller roles.
pub const CALLER_ROLES_HEADER: &str = "x-caller-roles";

/// An authenticated caller and its role claims.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub id: Option<String>,
    pub roles: Vec<String>,
}

impl CallerIdentity {
    pub fn new<S: Into<String>>(id: impl Into<String>, roles: impl IntoIterator<Item = S>) -> Self {
        Self {
            id: Some(id.into()),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Reads the identity stored in the request extensions, if any.
    pub fn from_request<T>(request: &Request<T>) -> Self {
        request
            .extensions()
            .get::<CallerIdentity>()
            .cloned()
            .unwrap_or_default()
    }

    /// Builds an identity from `x-caller-id` / `x-caller-roles` metadata.
    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        let header = |key: &str| {
            metadata
                .get(key)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let roles = header(CALLER_ROLES_HEADER)
            .map(|roles| {
                roles
                    .split(',')
                    .map(str::trim)
                    .filter(|role| !role.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: header(CALLER_ID_HEADER).map(String::from),
            roles,
        }
    }
}

/// Interceptor that trusts identity metadata set by an upstream gateway.
pub fn identity_interceptor(mut request: Request<()>) -> Result<Request<()>, Status> {
    if request.extensions().get::<CallerIdentity>().is_none() {
        let identity = CallerIdentity::from_metadata(request.metadata());
        request.extensions_mut().insert(identity);
    }
    Ok(request)
}
