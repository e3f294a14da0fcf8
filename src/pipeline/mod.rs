//! Request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Request<Body>
//!     → context.rs (RequestContext: headers, body, cookies, annotations)
//!     → chain.rs (stages in registration order)
//!         stage → Continue  → next stage
//!         stage → Respond   → finalize, stop
//!         stage → Err       → boundary.rs (log, uniform response), stop
//!     → Response (annotations applied)
//! ```
//!
//! # Design Decisions
//! - Stages are explicit values returning a `Flow`, not nested closures
//! - The chain is built once at startup and never reordered
//! - Failure detail is logged, never returned to the caller

pub mod boundary;
pub mod chain;
pub mod context;
pub mod error;
pub mod stage;

pub use boundary::ErrorBoundary;
pub use chain::{Chain, ChainBuilder};
pub use context::{Cookies, ParsedBody, RequestContext};
pub use error::{HandlerFailure, PipelineError};
pub use stage::{FnStage, Flow, Stage, StageResult};
