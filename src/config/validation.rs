//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that origins, methods and header names parse
//! - Detect duplicate auth tokens
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use axum::http::{HeaderName, Method};

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the whole configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::new("listener.bind_address", "must not be empty"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }
    if config.shutdown.release_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "shutdown.release_timeout_secs",
            "must be greater than 0",
        ));
    }
    if config.database.url.trim().is_empty() {
        errors.push(ValidationError::new("database.url", "must not be empty"));
    }
    if config.database.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be greater than 0"));
    }

    validate_cors(config, &mut errors);
    validate_csrf(config, &mut errors);
    validate_auth(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_cors(config: &AppConfig, errors: &mut Vec<ValidationError>) {
    let cors = &config.cors;

    if cors.allowed_origins.is_empty() {
        errors.push(ValidationError::new(
            "cors.allowed_origins",
            "must list at least one origin or \"*\"",
        ));
    }
    for origin in &cors.allowed_origins {
        if origin != "*" && url::Url::parse(origin).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("{origin:?} is not a valid origin"),
            ));
        }
    }
    for method in &cors.allowed_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_methods",
                format!("{method:?} is not a valid method"),
            ));
        }
    }
    for header in cors.allowed_headers.iter().chain(&cors.exposed_headers) {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "cors.headers",
                format!("{header:?} is not a valid header name"),
            ));
        }
    }
}

fn validate_csrf(config: &AppConfig, errors: &mut Vec<ValidationError>) {
    let csrf = &config.csrf;

    if csrf.cookie_name.trim().is_empty() {
        errors.push(ValidationError::new("csrf.cookie_name", "must not be empty"));
    }
    if HeaderName::from_bytes(csrf.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "csrf.header_name",
            format!("{:?} is not a valid header name", csrf.header_name),
        ));
    }
}

fn validate_auth(config: &AppConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();

    if config.auth.cookie_name.trim().is_empty() {
        errors.push(ValidationError::new("auth.cookie_name", "must not be empty"));
    }
    for (i, entry) in config.auth.tokens.iter().enumerate() {
        if entry.token.is_empty() {
            errors.push(ValidationError::new(format!("auth.tokens[{i}].token"), "must not be empty"));
        } else if !seen.insert(entry.token.as_str()) {
            errors.push(ValidationError::new(format!("auth.tokens[{i}].token"), "duplicate token"));
        }
        if entry.subject.is_empty() {
            errors.push(ValidationError::new(
                format!("auth.tokens[{i}].subject"),
                "must not be empty",
            ));
        }
    }
}
