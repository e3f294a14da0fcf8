//! The routing stage: delegation to route groups.
//!
//! # Responsibilities
//! - Resolve the request path against the [`RouteTable`]
//! - Hand the group a request with the prefix stripped
//! - Turn handler failures and panics into pipeline errors
//!
//! # Design Decisions
//! - Groups are opaque `Router`s; their internal 404 is their own answer
//! - A `HandlerFailure` travels back as a response extension so handlers
//!   can use `?` and the boundary still sees the original message

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tower::ServiceExt;

use crate::pipeline::{Flow, HandlerFailure, PipelineError, RequestContext, Stage, StageResult};
use crate::routing::table::RouteTable;

/// Delegates to the most specific route group.
#[derive(Debug, Clone)]
pub struct RouteStage {
    table: Arc<RouteTable>,
}

impl RouteStage {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }
}

impl Stage for RouteStage {
    fn name(&self) -> &'static str {
        "route"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let Some(group) = self.table.resolve(ctx.path()) else {
                return Err(PipelineError::NoRouteMatched {
                    path: ctx.path().to_string(),
                });
            };

            ctx.set_route_group(group.prefix().as_str());
            let uri = group
                .prefix()
                .strip(ctx.uri())
                .map_err(|err| PipelineError::Handler(err.into()))?;
            let request = ctx
                .delegated_request(uri)
                .map_err(|err| PipelineError::Handler(err.into()))?;

            tracing::debug!(group = %group.prefix(), "Delegating to route group");

            let outcome = AssertUnwindSafe(group.router().clone().oneshot(request))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(mut response)) => match response.extensions_mut().remove::<HandlerFailure>() {
                    Some(failure) => Err(PipelineError::Handler(failure)),
                    None => Ok(Flow::Respond(response)),
                },
                Ok(Err(never)) => match never {},
                Err(panic) => Err(PipelineError::Handler(HandlerFailure::from_panic(panic))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::OriginalUri;
    use axum::http::{Request, StatusCode, Uri};
    use axum::routing::get;
    use axum::Router;

    fn stage(router: Router) -> RouteStage {
        let table = RouteTable::builder().register("/group", router).unwrap().build();
        RouteStage::new(Arc::new(table))
    }

    fn ctx(uri: &str) -> RequestContext {
        RequestContext::from_request(Request::builder().uri(uri).body(Body::empty()).unwrap())
    }

    #[tokio::test]
    async fn test_delegates_with_prefix_stripped() {
        let router = Router::new().route(
            "/{id}",
            get(|uri: Uri, OriginalUri(original): OriginalUri| async move {
                format!("{} {}", uri.path(), original.path())
            }),
        );
        let mut ctx = ctx("/group/42");

        let Ok(Flow::Respond(response)) = stage(router).handle(&mut ctx).await else {
            panic!("expected a response");
        };
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"/42 /group/42");
        assert_eq!(ctx.route_group(), Some("/group"));
    }

    #[tokio::test]
    async fn test_group_owns_its_not_found() {
        let mut ctx = ctx("/group/anything");
        let Ok(Flow::Respond(response)) = stage(Router::new()).handle(&mut ctx).await else {
            panic!("expected the group's own response");
        };
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unmatched_path() {
        let mut ctx = ctx("/nowhere");
        let result = stage(Router::new()).handle(&mut ctx).await;
        assert!(matches!(result, Err(PipelineError::NoRouteMatched { .. })));
        assert!(ctx.route_group().is_none());
    }

    #[tokio::test]
    async fn test_handler_failure_surfaces() {
        let router = Router::new().route(
            "/",
            get(|| async { Err::<String, _>(HandlerFailure::new("db unreachable")) }),
        );
        let mut ctx = ctx("/group");

        match stage(router).handle(&mut ctx).await {
            Err(PipelineError::Handler(failure)) => assert_eq!(failure.message(), "db unreachable"),
            _ => panic!("expected handler failure"),
        }
    }

    #[tokio::test]
    async fn test_handler_panic_surfaces() {
        async fn explode() -> &'static str {
            panic!("invariant broken")
        }
        let router = Router::new().route("/", get(explode));
        let mut ctx = ctx("/group/");

        match stage(router).handle(&mut ctx).await {
            Err(PipelineError::Handler(failure)) => assert_eq!(failure.message(), "invariant broken"),
            _ => panic!("expected handler failure"),
        }
    }
}
