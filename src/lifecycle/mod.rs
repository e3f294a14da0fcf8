//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Auth registry → Route table → Chain → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Running → ShuttingDown → stop accepting
//!             → release resource (bounded wait) → Terminated → exit code
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → trigger shutdown (repeats ignored)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Exactly one shutdown sequence per process
//! - Shutdown has timeout: exit after deadline even if release hangs

pub mod resource;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use resource::{Resource, ResourceError, ResourceGuard, ResourceHandle};
pub use shutdown::{LifecycleCoordinator, LifecycleState, ShutdownOutcome};
pub use startup::{build_chain, serve, App, AppBuilder, StartupError};
