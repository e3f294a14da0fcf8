//! The process-wide strategy registry and the stage that exposes it.
//!
//! # Responsibilities
//! - Hold the single configured [`Strategy`]
//! - Extract credential material from headers and cookies
//! - Make verification available to route groups that opt in
//!
//! # Design Decisions
//! - The registry is built once by its constructor and shared read-only;
//!   there is no global to configure twice
//! - The stage never rejects: unauthenticated callers still reach public
//!   routes

use std::fmt;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use futures_util::future::BoxFuture;

use crate::auth::strategy::{AuthError, Credential, Principal, Strategy};
use crate::pipeline::{Cookies, Flow, RequestContext, Stage, StageResult};

/// The configured authentication strategy plus credential lookup rules.
pub struct AuthRegistry {
    strategy: Box<dyn Strategy>,
    cookie_name: String,
}

impl AuthRegistry {
    pub fn configure(strategy: impl Strategy, cookie_name: impl Into<String>) -> Self {
        Self {
            strategy: Box::new(strategy),
            cookie_name: cookie_name.into(),
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Pick the credential a request presents. A bearer header takes
    /// precedence over the auth cookie.
    pub fn credential(&self, headers: &HeaderMap, cookies: &Cookies) -> Credential {
        if let Some(value) = headers.get(header::AUTHORIZATION) {
            let token = value.to_str().ok().and_then(|v| {
                v.strip_prefix("Bearer ")
                    .or_else(|| v.strip_prefix("bearer "))
            });
            return match token.map(str::trim) {
                Some(token) if !token.is_empty() => Credential::Bearer(token.to_string()),
                _ => Credential::Malformed,
            };
        }

        match cookies.get(&self.cookie_name) {
            Some(token) if !token.is_empty() => Credential::Session(token.to_string()),
            _ => Credential::Absent,
        }
    }

    pub fn verify(&self, credential: &Credential) -> Result<Principal, AuthError> {
        match credential {
            Credential::Absent => Err(AuthError::invalid("no credential presented")),
            Credential::Malformed => Err(AuthError::invalid("malformed authorization header")),
            Credential::Bearer(_) | Credential::Session(_) => self.strategy.verify(credential),
        }
    }
}

impl fmt::Debug for AuthRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRegistry")
            .field("strategy", &self.strategy.name())
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

/// Cheap handle to the registry, attached to every request.
#[derive(Debug, Clone)]
pub struct Authenticator(Arc<AuthRegistry>);

impl Authenticator {
    pub fn new(registry: AuthRegistry) -> Self {
        Self(Arc::new(registry))
    }

    pub fn registry(&self) -> &AuthRegistry {
        &self.0
    }

    /// Extract and verify in one step.
    pub fn authenticate(&self, headers: &HeaderMap, cookies: &Cookies) -> Result<Principal, AuthError> {
        let credential = self.0.credential(headers, cookies);
        self.0.verify(&credential)
    }
}

/// Attaches the [`Authenticator`] to the request context.
#[derive(Debug, Clone)]
pub struct AuthenticateStage {
    authenticator: Authenticator,
}

impl AuthenticateStage {
    pub fn new(authenticator: Authenticator) -> Self {
        Self { authenticator }
    }
}

impl Stage for AuthenticateStage {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageResult> {
        ctx.extensions_mut().insert(self.authenticator.clone());
        Box::pin(async { Ok(Flow::Continue) })
    }
}
