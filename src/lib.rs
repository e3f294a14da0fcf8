//! Expense server request pipeline.
//!
//! Every request runs through one frozen chain of stages before it is
//! delegated by path prefix to a route group:
//!
//! ```text
//! observe → harden → body → cookies → [forgery] → cors → authenticate → route
//!                                                                          │
//!                                    error boundary ◀── any failure ───────┘
//! ```
//!
//! The lifecycle coordinator runs beside the server and releases the shared
//! database pool exactly once when a termination signal arrives.

// Core subsystems
pub mod config;
pub mod http;
pub mod pipeline;
pub mod routing;

// Cross-cutting concerns
pub mod auth;
pub mod lifecycle;
pub mod observability;
pub mod security;

// Collaborators
pub mod persistence;
pub mod routes;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::{App, AppBuilder, LifecycleCoordinator};
pub use pipeline::Chain;
