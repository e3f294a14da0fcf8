//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → consumed once at startup to build the pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the pipeline is built from it once
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::AppConfig;
pub use schema::{
    AuthConfig, CorsConfig, CsrfConfig, DatabaseConfig, ListenerConfig, ObservabilityConfig,
    SecurityConfig, ShutdownConfig, TimeoutConfig, TokenConfig,
};
