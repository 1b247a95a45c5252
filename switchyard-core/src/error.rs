//! Failure taxonomies for the dispatch core and the client correlator

use std::time::Duration;

use serde_json::Value;

use crate::protocol::{RequestMethod, ResponseStatus};

/// Result type used across the dispatch core
pub type Result<T> = std::result::Result<T, RpcError>;

/// Everything that can go wrong between an inbound request and its response.
///
/// The dispatcher never lets one of these escape: the exception classifier
/// turns each variant into a response status and payload.
#[derive(thiserror::Error, Debug)]
pub enum RpcError {
    #[error("No route matches {method}:{route}")]
    RouteNotFound { method: RequestMethod, route: String },

    #[error("Path '{path}' does not fit pattern '{pattern}'")]
    PathParameterNotFound { path: String, pattern: String },

    #[error("Required parameter '{0}' is missing")]
    ParameterNotFound(String),

    #[error("Parameter '{name}' expects {expected} but got {actual}")]
    IncompatibleParameter { name: String, expected: String, actual: String },

    #[error("Malformed argument: {0}")]
    MalformedArgument(String),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Session expired or not found")]
    SessionExpired,

    #[error("Session id rejected: {0}")]
    InvalidSessionId(String),

    #[error("Access denied: {0}")]
    Unauthorized(String),

    /// Business error raised by a handler with the status it wants returned
    #[error("{message}")]
    Declared { status: ResponseStatus, message: String },

    #[error("Route {0} is registered twice")]
    DuplicateRoute(String),

    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RpcError {
    /// Application error carrying an explicit response status
    pub fn declared(status: ResponseStatus, message: impl Into<String>) -> Self {
        RpcError::Declared { status, message: message.into() }
    }

    pub fn incompatible(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        RpcError::IncompatibleParameter {
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        RpcError::Internal(anyhow::anyhow!(message.into()))
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::MalformedArgument(err.to_string())
    }
}

/// Failures observed by a caller through its call handle
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("Request {id} timed out after {after:?}")]
    Timeout { id: i64, after: Duration },

    #[error("Remote call failed with {status}")]
    Remote { status: ResponseStatus, payload: Option<Value> },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Request id {0} already has a pending call")]
    DuplicateRequestId(i64),
}

/// Frame recognition and decoding failures
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("Frame is neither a request nor a response")]
    Unrecognized,

    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_parameter() {
        let err = RpcError::incompatible("age", "integer", "string");
        assert_eq!(err.to_string(), "Parameter 'age' expects integer but got string");

        let err = RpcError::ParameterNotFound("b".to_string());
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_validation_joins_violations() {
        let err = RpcError::Validation(vec!["name is blank".into(), "age < 0".into()]);
        assert_eq!(err.to_string(), "Validation failed: name is blank; age < 0");
    }

    #[test]
    fn test_serde_errors_are_malformed_arguments() {
        let err: RpcError = serde_json::from_str::<i32>("nope").unwrap_err().into();
        assert!(matches!(err, RpcError::MalformedArgument(_)));
    }
}
