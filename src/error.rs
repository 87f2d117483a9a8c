//! Error types for the raw query service.
//!
//! Defines the error enum shared by the classifier, codec, executors and the
//! orchestrator, plus the mapping onto gRPC status codes.

use thiserror::Error;
use tonic::Status;

/// Message returned to callers on any denial. Deliberately carries no detail.
pub const DENIED_MESSAGE: &str = "Query execution not permitted";

/// Main error type for raw query operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RawQueryError {
    /// The risk scan flagged the query or the policy rejected it.
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The parameter payload was not a JSON object.
    #[error("Malformed parameters: {0}")]
    MalformedParameters(String),

    /// Any failure surfaced by the execution interface.
    #[error("Execution error: {0}")]
    Execution(String),

    /// A value could not be encoded or decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The caller cancelled the request before it completed.
    #[error("Request cancelled")]
    Cancelled,

    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RawQueryError {
    /// Creates an authorization error. The reason is logged, never returned.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::AuthorizationDenied(reason.into())
    }

    /// Creates a malformed-parameters error with the given message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedParameters(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates an encoding error with the given message.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::AuthorizationDenied(_) => "Authorization Denied",
            Self::MalformedParameters(_) => "Malformed Parameters",
            Self::Execution(_) => "Execution Failure",
            Self::Encoding(_) => "Encoding Failure",
            Self::Cancelled => "Cancelled",
            Self::Connection(_) => "Connection Error",
            Self::Config(_) => "Configuration Error",
        }
    }

    /// Maps the error onto the status returned over the wire.
    ///
    /// Denials never echo their reason back to the caller.
    pub fn to_status(&self) -> Status {
        match self {
            Self::AuthorizationDenied(_) => Status::permission_denied(DENIED_MESSAGE),
            Self::MalformedParameters(msg) => Status::invalid_argument(msg.clone()),
            Self::Cancelled => Status::cancelled("Request cancelled"),
            Self::Execution(msg)
            | Self::Encoding(msg)
            | Self::Connection(msg)
            | Self::Config(msg) => Status::internal(msg.clone()),
        }
    }
}

impl From<RawQueryError> for Status {
    fn from(err: RawQueryError) -> Self {
        err.to_status()
    }
}

impl From<serde_json::Error> for RawQueryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Result type alias using RawQueryError.
pub type Result<T> = std::result::Result<T, RawQueryError>;
