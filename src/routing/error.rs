//! Dispatch errors and their status codes.

use hyper::StatusCode;

use crate::plugins::{HandlerError, RouteNotFound};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Bad version, reserved path or malformed path.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    RouteNotFound(#[from] RouteNotFound),

    #[error("route '{route}' has no sub-route '{sub_route}'")]
    SubRouteNotFound { route: String, sub_route: String },

    #[error("method {0} not supported")]
    UnsupportedMethod(String),

    /// A handler refused the request as malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A handler failed or panicked after routing.
    #[error("handler failure: {0}")]
    HandlerFailure(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::HandlerFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<HandlerError> for DispatchError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::UnsupportedMethod(method) => {
                DispatchError::UnsupportedMethod(method.to_string())
            }
            HandlerError::BadRequest(reason) => DispatchError::BadRequest(reason),
            other => DispatchError::HandlerFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_handler_failures_are_server_errors() {
        assert_eq!(
            DispatchError::Protocol("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DispatchError::RouteNotFound(RouteNotFound("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DispatchError::UnsupportedMethod("PATCH".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DispatchError::HandlerFailure("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn io_errors_become_failures() {
        let err: DispatchError =
            HandlerError::Io(std::io::Error::other("disk gone")).into();
        assert!(matches!(err, DispatchError::HandlerFailure(_)));
    }
}
