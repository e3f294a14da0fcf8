//! Failures raised inside the pipeline.

use std::any::Any;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that halt the chain and reach the error boundary.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The declared content type does not match the payload.
    #[error("malformed {content_type} body: {reason}")]
    MalformedBody {
        content_type: &'static str,
        reason: String,
    },

    /// The structured body exceeds the configured limit.
    #[error("request body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },

    /// The body stream failed mid-read (usually a client disconnect).
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// No route group is mounted for the path.
    #[error("no route matched {path}")]
    NoRouteMatched { path: String },

    /// Anything raised by a route group's own logic.
    #[error("{0}")]
    Handler(HandlerFailure),
}

impl PipelineError {
    /// External status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::MalformedBody { .. } | PipelineError::BodyRead(_) => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PipelineError::NoRouteMatched { .. } => StatusCode::NOT_FOUND,
            PipelineError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classified errors carry a specific client-facing status; everything
    /// else is flattened to a generic 500.
    pub fn is_classified(&self) -> bool {
        !self.status().is_server_error()
    }
}

/// A failure raised by a route handler.
///
/// Handlers return it (or any error converted with `?`) and the route
/// stage turns it into [`PipelineError::Handler`]. The message is only
/// ever written to the log.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    message: String,
}

impl HandlerFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::new(message)
    }
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl<E> From<E> for HandlerFailure
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(err.to_string())
    }
}

// The failure rides back to the route stage as a response extension; the
// body stays empty so nothing leaks if it is ever served directly.
impl IntoResponse for HandlerFailure {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(self);
        response
    }
}
