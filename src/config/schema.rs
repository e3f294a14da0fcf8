//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the expense server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Hardening headers and body limits.
    pub security: SecurityConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Request-forgery protection (disabled unless turned on).
    pub csrf: CsrfConfig,

    /// Authentication strategy settings.
    pub auth: AuthConfig,

    /// Persistence backend connection.
    pub database: DatabaseConfig,

    /// Shutdown behavior.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable defensive response headers.
    pub enable_headers: bool,
    /// Maximum structured body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 100 * 1024, // 100KB
        }
    }
}

/// Cross-origin policy configuration.
///
/// `allowed_origins = ["*"]` admits every origin.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins, or `"*"` for any.
    pub allowed_origins: Vec<String>,

    /// Allow cookies and authorization headers on cross-origin requests.
    pub allow_credentials: bool,

    /// Methods announced on preflight responses.
    pub allowed_methods: Vec<String>,

    /// Headers announced on preflight responses. Empty reflects the
    /// headers the browser asked for.
    pub allowed_headers: Vec<String>,

    /// Response headers exposed to scripts.
    pub exposed_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: true,
            allowed_methods: ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            max_age_secs: None,
        }
    }
}

/// Request-forgery protection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Register the forgery protection stage.
    pub enabled: bool,

    /// Cookie carrying the anti-forgery token.
    pub cookie_name: String,

    /// Header a client echoes the token in.
    pub header_name: String,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cookie_name: "_csrf".to_string(),
            header_name: "x-csrf-token".to_string(),
        }
    }
}

/// Authentication strategy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Cookie consulted when no bearer token is sent.
    pub cookie_name: String,

    /// Static token table for the token strategy.
    pub tokens: Vec<TokenConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "token".to_string(),
            tokens: Vec::new(),
        }
    }
}

/// A single token → principal mapping.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Opaque credential presented by the caller.
    pub token: String,

    /// Principal subject identifier.
    pub subject: String,

    /// Optional human-readable name.
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Persistence backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL (overridden by `DATABASE_URL`).
    pub url: String,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// Time to wait for a pooled connection, in seconds.
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/expenses".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound on releasing the persistence resource, in seconds.
    pub release_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            release_timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.cors.allowed_origins, vec!["*"]);
        assert!(config.cors.allow_credentials);
        assert!(!config.csrf.enabled);
    }

    #[test]
    fn test_partial_sections() {
        let config: AppConfig = toml::from_str(
            r#"
            [cors]
            allowed_origins = ["https://example.com"]
            allow_credentials = false

            [[auth.tokens]]
            token = "abc"
            subject = "user-1"
            "#,
        )
        .unwrap();

        assert_eq!(config.cors.allowed_origins, vec!["https://example.com"]);
        assert!(!config.cors.allow_credentials);
        // untouched fields keep their defaults
        assert_eq!(config.cors.allowed_methods.len(), 6);
        assert_eq!(config.auth.tokens[0].subject, "user-1");
        assert_eq!(config.auth.cookie_name, "token");
    }
}
