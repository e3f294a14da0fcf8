//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     (prefix, Router)[]
//!     → matcher.rs (validate and normalize prefixes)
//!     → table.rs (reject duplicates, freeze as RouteTable)
//!
//! Incoming request (after the global stages):
//!     → dispatch.rs (RouteStage)
//!     → table.rs (longest prefix lookup)
//!     → route group Router with the prefix stripped
//!     → Return: group response, HandlerFailure, or NoRouteMatched
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same group

pub mod dispatch;
pub mod matcher;
pub mod table;

pub use dispatch::RouteStage;
pub use matcher::PathPrefix;
pub use table::{RouteGroup, RouteTable, RouteTableBuilder, RouteTableError};
