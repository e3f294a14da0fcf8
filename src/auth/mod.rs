//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! startup:
//!     strategy.rs (StaticTokenStrategy or any Strategy)
//!     → registry.rs (AuthRegistry::configure, wrapped in Authenticator)
//! per request:
//!     → AuthenticateStage attaches the Authenticator
//!     → route group handler opts in via extract.rs (Authenticated)
//!     → Principal attached to the handler's request
//! ```
//!
//! # Design Decisions
//! - Verification is pure; callers attach the principal they get back
//! - Failed verification is a 401 answered by the route, never the error
//!   boundary

pub mod extract;
pub mod registry;
pub mod strategy;

pub use extract::{AuthRejection, Authenticated, MaybeAuthenticated};
pub use registry::{AuthRegistry, AuthenticateStage, Authenticator};
pub use strategy::{AuthError, Credential, Principal, StaticTokenStrategy, Strategy};
