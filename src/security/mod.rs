//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (after observe):
//!     → headers.rs (record hardening headers for the eventual response)
//!     → [body, cookies parsed]
//!     → forgery.rs (double-submit token check, only when enabled)
//!     → cors.rs (admit, annotate, answer preflight, or reject)
//!     → Pass to authentication and routing
//! ```
//!
//! # Design Decisions
//! - Policy comes from configuration; nothing here hard-codes an origin
//! - Fail closed: a rejected origin or token never reaches a route group
//! - Rejections are short-circuit responses, not errors

pub mod cors;
pub mod forgery;
pub mod headers;

pub use cors::{AllowedOrigins, CorsDecision, CorsPolicy, CorsStage};
pub use forgery::{CsrfToken, ForgeryStage};
pub use headers::HardenStage;
