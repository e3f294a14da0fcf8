//! Uniform failure responses.
//!
//! # Responsibilities
//! - Log every failure with the method, path and request id it belongs to
//! - Answer with a fixed body per status, never the error text
//!
//! # Design Decisions
//! - Classified failures (400, 404, 413) keep their status; anything else
//!   becomes `500 Internal Server Error`
//! - Internal detail goes to the log sink only
//! - A panic while logging still yields the generic response

use std::panic::{self, AssertUnwindSafe};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::pipeline::context::RequestContext;
use crate::pipeline::error::PipelineError;

/// Terminal stage that converts failures into responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorBoundary;

impl ErrorBoundary {
    pub fn new() -> Self {
        Self
    }

    /// Log `error` and produce the response the caller sees.
    pub fn handle(&self, error: &PipelineError, ctx: &RequestContext) -> Response {
        let status = error.status();
        // A panicking log sink must not keep the response from going out.
        let _ = panic::catch_unwind(AssertUnwindSafe(|| log_failure(error, ctx)));
        generic_response(status)
    }
}

fn log_failure(error: &PipelineError, ctx: &RequestContext) {
    let request_id = ctx.request_id().map(|id| id.as_str()).unwrap_or("unknown");

    if error.is_classified() {
        tracing::warn!(
            request_id = %request_id,
            method = %ctx.method(),
            path = %ctx.path(),
            status = error.status().as_u16(),
            "Request rejected: {}",
            error
        );
    } else {
        tracing::error!(
            request_id = %request_id,
            method = %ctx.method(),
            path = %ctx.path(),
            "Error: {}",
            error
        );
    }
}

/// The only body shape a failing request ever receives.
pub fn generic_response(status: StatusCode) -> Response {
    let reason = status.canonical_reason().unwrap_or("Error");
    (status, reason).into_response()
}
