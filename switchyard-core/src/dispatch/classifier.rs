//! Failure to response mapping

use serde_json::{json, Value};

use crate::dispatch::Mono;
use crate::error::RpcError;
use crate::protocol::ResponseStatus;

/// Payload sent for unclassified failures when diagnostics are suppressed
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Turns any [`RpcError`] into the single response the caller receives
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionClassifier {
    expose_diagnostics: bool,
}

impl ExceptionClassifier {
    pub fn new(expose_diagnostics: bool) -> Self {
        Self { expose_diagnostics }
    }

    pub fn exposes_diagnostics(&self) -> bool {
        self.expose_diagnostics
    }

    pub fn classify(&self, error: &RpcError) -> Mono {
        let message = |e: &RpcError| Some(Value::String(e.to_string()));

        match error {
            RpcError::RouteNotFound { .. }
            | RpcError::PathParameterNotFound { .. }
            | RpcError::ParameterNotFound(_)
            | RpcError::IncompatibleParameter { .. }
            | RpcError::MalformedArgument(_)
            | RpcError::InvalidSessionId(_)
            | RpcError::SessionExpired => Mono::new(ResponseStatus::BadRequest, message(error)),

            RpcError::Validation(violations) => {
                Mono::new(ResponseStatus::BadParameters, Some(json!(violations)))
            }

            RpcError::Unauthorized(_) => Mono::new(ResponseStatus::PermissionDenied, message(error)),

            RpcError::Declared { status, message } => {
                Mono::new(*status, Some(Value::String(message.clone())))
            }

            RpcError::DuplicateRoute(_) | RpcError::InvalidPattern { .. } | RpcError::Internal(_) => {
                self.unclassified(error)
            }
        }
    }

    fn unclassified(&self, error: &RpcError) -> Mono {
        log::error!("Unhandled failure: {:?}", error);

        let payload = if self.expose_diagnostics {
            json!({ "message": error.to_string(), "detail": format!("{:?}", error) })
        } else {
            Value::String(INTERNAL_ERROR_MESSAGE.to_string())
        };
        Mono::new(ResponseStatus::InternalError, Some(payload))
    }
}
