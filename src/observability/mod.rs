//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline produces:
//!     → logging.rs (structured log events: entry line, failures)
//!     → metrics.rs (per-response counters and latency histograms)
//!
//! Consumers:
//!     → stdout (plain or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every log line a request produces
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
