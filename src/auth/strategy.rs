//! Credential verification strategies.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::AuthConfig;

/// The authenticated identity of a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            display_name: None,
        }
    }
}

/// Credential material presented by a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// Session token carried in the auth cookie.
    Session(String),
    /// Nothing was presented.
    Absent,
    /// An `Authorization` header that is not a usable bearer token.
    Malformed,
}

impl Credential {
    /// The raw token, if any.
    pub fn token(&self) -> Option<&str> {
        match self {
            Credential::Bearer(token) | Credential::Session(token) => Some(token.as_str()),
            Credential::Absent | Credential::Malformed => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credential: {reason}")]
    InvalidCredential { reason: &'static str },
}

impl AuthError {
    pub(crate) fn invalid(reason: &'static str) -> Self {
        AuthError::InvalidCredential { reason }
    }
}

/// A pluggable way of turning credential material into a [`Principal`].
///
/// Implementations must be pure with respect to the request: the same
/// credential always yields the same result for a given configuration.
pub trait Strategy: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn verify(&self, credential: &Credential) -> Result<Principal, AuthError>;
}

/// Opaque tokens mapped to principals from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenStrategy {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|entry| {
                let principal = Principal {
                    subject: entry.subject.clone(),
                    display_name: entry.display_name.clone(),
                };
                (entry.token.clone(), principal)
            })
            .collect();
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Strategy for StaticTokenStrategy {
    fn name(&self) -> &'static str {
        "static-token"
    }

    fn verify(&self, credential: &Credential) -> Result<Principal, AuthError> {
        let token = credential
            .token()
            .ok_or_else(|| AuthError::invalid("no token presented"))?;
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::invalid("unknown token"))
    }
}
