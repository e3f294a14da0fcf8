//! Ordered, frozen middleware chain.
//!
//! # Responsibilities
//! - Collect stages in registration order at startup
//! - Run them strictly in that order for every request
//! - Stop at the first stage that responds or fails
//! - Send failures through the error boundary, including stage panics
//!
//! # Design Decisions
//! - `ChainBuilder` is the only way to add stages; a built `Chain` has no
//!   mutation API, so it is shared via `Arc` without locks
//! - The boundary is the chain's terminal handler, not a regular stage,
//!   so no stage can skip it
//! - A chain that runs out of stages without a response answers 404

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::FutureExt;

use crate::observability::metrics;
use crate::pipeline::boundary::ErrorBoundary;
use crate::pipeline::context::RequestContext;
use crate::pipeline::error::{HandlerFailure, PipelineError};
use crate::pipeline::stage::{Flow, Stage};

/// A type-erased stage that can be stored in a vector.
pub type BoxedStage = Arc<dyn Stage>;

/// Builder for a [`Chain`].
#[derive(Default)]
pub struct ChainBuilder {
    stages: Vec<BoxedStage>,
    boundary: ErrorBoundary,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage. Stages run in the order they are registered.
    pub fn register<S: Stage>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Freeze the chain.
    pub fn build(self) -> Chain {
        Chain {
            stages: self.stages,
            boundary: self.boundary,
        }
    }
}

/// The immutable request pipeline.
pub struct Chain {
    stages: Vec<BoxedStage>,
    boundary: ErrorBoundary,
}

impl Chain {
    pub fn builder() -> ChainBuilder {
        ChainBuilder::new()
    }

    /// Names of all stages in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run one request through the chain.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let start_time = Instant::now();
        let mut ctx = RequestContext::from_request(request);

        let response = self.run(&mut ctx).await;
        let response = ctx.finalize(response);

        metrics::record_request(
            ctx.method().as_str(),
            response.status().as_u16(),
            ctx.route_group().unwrap_or("none"),
            start_time,
        );
        response
    }

    async fn run(&self, ctx: &mut RequestContext) -> Response {
        for stage in &self.stages {
            let outcome = AssertUnwindSafe(async { stage.handle(ctx).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(PipelineError::Handler(HandlerFailure::from_panic(panic))));

            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Respond(response)) => {
                    tracing::debug!(
                        stage = stage.name(),
                        status = response.status().as_u16(),
                        "Stage finalized response"
                    );
                    return response;
                }
                Err(err) => return self.boundary.handle(&err, ctx),
            }
        }

        let err = PipelineError::NoRouteMatched {
            path: ctx.path().to_string(),
        };
        self.boundary.handle(&err, ctx)
    }
}
