//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router that hands every request to the chain
//! - Wire up transport-level layers (timeout, request id)
//! - Give transport-level responses the hardening set and request id
//! - Bind to the listener and stop accepting on the shutdown broadcast
//!
//! # Design Decisions
//! - A single fallback handler owns all paths; routing happens inside the
//!   chain so every request passes through every global stage first
//! - No `TraceLayer`: the observe stage is the one entry log line

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware;
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use crate::config::AppConfig;
use crate::pipeline::Chain;
use crate::security::HardenStage;

/// HTTP front end for the request pipeline.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &AppConfig, chain: Arc<Chain>) -> Self {
        let router = Self::build_router(config, chain);
        Self { router }
    }

    /// Build the Axum router with all transport layers.
    fn build_router(config: &AppConfig, chain: Arc<Chain>) -> Router {
        let timeout = Duration::from_secs(config.timeouts.request_secs);
        Router::new()
            .fallback(pipeline_handler)
            .with_state(chain)
            .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
            .layer(middleware::map_response_with_state(
                HardenStage::from_config(&config.security),
                harden_transport_response,
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Accept connections until `shutdown` fires, then let in-flight
    /// requests drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                // A closed channel means the coordinator is gone; stop too.
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server no longer accepting connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn pipeline_handler(State(chain): State<Arc<Chain>>, request: Request<Body>) -> Response {
    chain.dispatch(request).await
}

// Responses from the chain already carry the set; this covers the timeout.
async fn harden_transport_response(State(harden): State<HardenStage>, mut response: Response) -> Response {
    harden.apply_missing(response.headers_mut());
    response
}
