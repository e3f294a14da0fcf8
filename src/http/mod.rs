//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, timeout, request id layer)
//!     → pipeline::Chain::dispatch
//!         → middleware/observe.rs (entry log, correlation id)
//!         → middleware/body.rs (JSON / form decoding)
//!         → middleware/cookies.rs (cookie map)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::{RequestId, RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
