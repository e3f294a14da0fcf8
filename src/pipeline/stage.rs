//! The contract every pipeline stage honors.
//!
//! A stage looks at the [`RequestContext`] and returns one of:
//! - `Ok(Flow::Continue)`: hand the request to the next stage
//! - `Ok(Flow::Respond(response))`: finalize now, later stages never run
//! - `Err(error)`: halt, the error boundary answers
//!
//! Stages keep no per-request state of their own; anything they need beyond
//! the context is captured when they are constructed.

use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::pipeline::context::RequestContext;
use crate::pipeline::error::PipelineError;

/// What a stage decided.
pub enum Flow {
    /// Pass control to the next stage.
    Continue,
    /// Short-circuit with this response.
    Respond(Response),
}

/// Result type returned by stages.
pub type StageResult = Result<Flow, PipelineError>;

/// One unit of the middleware chain.
pub trait Stage: Send + Sync + 'static {
    /// Stable name used in logs and for chain inspection.
    fn name(&self) -> &'static str;

    /// Process the request context.
    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageResult>;
}

/// A stage built from a synchronous closure.
///
/// Useful for small stages that never await.
pub struct FnStage<F> {
    name: &'static str,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&mut RequestContext) -> StageResult + Send + Sync + 'static,
{
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Stage for FnStage<F>
where
    F: Fn(&mut RequestContext) -> StageResult + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageResult> {
        let result = (self.func)(ctx);
        Box::pin(async move { result })
    }
}
