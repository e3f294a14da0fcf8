//! Entry logging.
//!
//! Runs first so every request is logged exactly once, including the ones
//! later stages reject.

use futures_util::future::BoxFuture;

use crate::http::request::RequestId;
use crate::pipeline::{Flow, RequestContext, Stage, StageResult};

/// Assigns the correlation id and logs `<METHOD> <path>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObserveStage;

impl ObserveStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for ObserveStage {
    fn name(&self) -> &'static str {
        "observe"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let id = ctx
                .request_id()
                .cloned()
                .or_else(|| RequestId::from_headers(ctx.headers()))
                .unwrap_or_else(RequestId::generate);

            let target = ctx
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/")
                .to_string();
            tracing::info!(request_id = %id, "{} {}", ctx.method(), target);

            ctx.set_request_id(id);
            Ok(Flow::Continue)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::X_REQUEST_ID;
    use axum::body::Body;
    use axum::http::Request;

    #[tokio::test]
    async fn test_keeps_incoming_request_id() {
        let mut ctx = RequestContext::from_request(
            Request::builder()
                .uri("/auth/login")
                .header("x-request-id", "upstream-7")
                .body(Body::empty())
                .unwrap(),
        );

        assert!(matches!(ObserveStage.handle(&mut ctx).await, Ok(Flow::Continue)));
        assert_eq!(ctx.request_id().unwrap().as_str(), "upstream-7");
        assert_eq!(ctx.annotations()[&X_REQUEST_ID], "upstream-7");
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let mut ctx = RequestContext::from_request(
            Request::builder().uri("/").body(Body::empty()).unwrap(),
        );

        ObserveStage.handle(&mut ctx).await.unwrap();
        assert!(uuid::Uuid::parse_str(ctx.request_id().unwrap().as_str()).is_ok());
    }
}
