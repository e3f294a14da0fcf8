//! Cross-origin policy.
//!
//! # Responsibilities
//! - Decide, per request, whether the declared `Origin` is admitted
//! - Annotate admitted responses with permission headers
//! - Answer preflight `OPTIONS` requests without reaching a route
//!
//! # Design Decisions
//! - Requests without an `Origin` header are not cross-origin and pass
//!   through untouched
//! - Disallowed origins are rejected with 403 before routing
//! - With credentials allowed, the wildcard policy reflects the caller's
//!   origin, since browsers refuse `*` on credentialed responses

use std::collections::HashSet;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;

use crate::config::CorsConfig;
use crate::pipeline::{Flow, RequestContext, Stage, StageResult};

/// The set of admitted origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Any origin (`*`).
    Any,
    /// Exactly these origins.
    List(HashSet<String>),
}

impl AllowedOrigins {
    pub fn is_allowed(&self, origin: &str) -> bool {
        match self {
            AllowedOrigins::Any => true,
            AllowedOrigins::List(origins) => origins.contains(origin),
        }
    }
}

/// Resolved cross-origin policy.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: AllowedOrigins,
    allow_credentials: bool,
    allowed_methods: Vec<Method>,
    /// Empty reflects `Access-Control-Request-Headers`.
    allowed_headers: Vec<String>,
    exposed_headers: Vec<String>,
    max_age_secs: Option<u64>,
}

/// Outcome of evaluating a request against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsDecision {
    /// No `Origin` header.
    NotCrossOrigin,
    /// Admitted simple or actual request.
    Allowed,
    /// Admitted preflight request.
    Preflight,
    /// Origin, method or headers not admitted.
    Rejected(&'static str),
}

impl CorsPolicy {
    pub fn new(allowed_origins: AllowedOrigins, allow_credentials: bool) -> Self {
        Self {
            allowed_origins,
            allow_credentials,
            allowed_methods: vec![
                Method::GET,
                Method::HEAD,
                Method::PUT,
                Method::PATCH,
                Method::POST,
                Method::DELETE,
            ],
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            max_age_secs: None,
        }
    }

    /// Build from validated configuration. Entries that do not parse are
    /// skipped (validation already reported them).
    pub fn from_config(config: &CorsConfig) -> Self {
        let allowed_origins = if config.allowed_origins.iter().any(|o| o == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(config.allowed_origins.iter().cloned().collect())
        };

        Self {
            allowed_origins,
            allow_credentials: config.allow_credentials,
            allowed_methods: config
                .allowed_methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.as_bytes()).ok())
                .collect(),
            allowed_headers: config.allowed_headers.iter().map(|h| h.to_ascii_lowercase()).collect(),
            exposed_headers: config.exposed_headers.clone(),
            max_age_secs: config.max_age_secs,
        }
    }

    pub fn allowed_origins(&self) -> &AllowedOrigins {
        &self.allowed_origins
    }

    pub fn allow_credentials(&self) -> bool {
        self.allow_credentials
    }

    /// Classify a request.
    pub fn evaluate(&self, ctx: &RequestContext) -> CorsDecision {
        let Some(origin) = origin(ctx) else {
            return CorsDecision::NotCrossOrigin;
        };
        if !self.allowed_origins.is_allowed(origin) {
            return CorsDecision::Rejected("origin not allowed");
        }

        if *ctx.method() != Method::OPTIONS {
            return CorsDecision::Allowed;
        }
        // Every cross-origin OPTIONS is answered here; a requested method,
        // when present, must still be admitted.
        let Some(requested) = ctx.headers().get(header::ACCESS_CONTROL_REQUEST_METHOD) else {
            return CorsDecision::Preflight;
        };

        let method = requested
            .to_str()
            .ok()
            .and_then(|m| Method::from_bytes(m.trim().as_bytes()).ok());
        match method {
            Some(m) if self.allowed_methods.contains(&m) => {}
            _ => return CorsDecision::Rejected("method not allowed"),
        }

        if !self.allowed_headers.is_empty() {
            let admitted = requested_headers(ctx)
                .iter()
                .all(|h| self.allowed_headers.iter().any(|a| a == "*" || a == h));
            if !admitted {
                return CorsDecision::Rejected("header not allowed");
            }
        }

        CorsDecision::Preflight
    }

    fn annotate_allowed(&self, ctx: &mut RequestContext, origin: &str) {
        let reflect = self.allow_credentials || matches!(self.allowed_origins, AllowedOrigins::List(_));
        let allow_origin = if reflect {
            HeaderValue::from_str(origin).ok()
        } else {
            Some(HeaderValue::from_static("*"))
        };

        if let Some(value) = allow_origin {
            ctx.annotate(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        if reflect {
            ctx.annotate_append(header::VARY, HeaderValue::from_static("Origin"));
        }
        if self.allow_credentials {
            ctx.annotate(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if !self.exposed_headers.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.exposed_headers.join(",")) {
                ctx.annotate(header::ACCESS_CONTROL_EXPOSE_HEADERS, value);
            }
        }
    }

    fn annotate_preflight(&self, ctx: &mut RequestContext) {
        let methods = self
            .allowed_methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(",");
        if let Ok(value) = HeaderValue::from_str(&methods) {
            ctx.annotate(header::ACCESS_CONTROL_ALLOW_METHODS, value);
        }

        let headers = if self.allowed_headers.is_empty() {
            requested_headers(ctx).join(",")
        } else {
            self.allowed_headers.join(",")
        };
        if !headers.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&headers) {
                ctx.annotate(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
            }
            if self.allowed_headers.is_empty() {
                ctx.annotate_append(
                    header::VARY,
                    HeaderValue::from_static("Access-Control-Request-Headers"),
                );
            }
        }

        if let Some(max_age) = self.max_age_secs {
            ctx.annotate(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age));
        }
    }
}

fn origin(ctx: &RequestContext) -> Option<&str> {
    ctx.headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
}

fn requested_headers(ctx: &RequestContext) -> Vec<String> {
    ctx.headers()
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Pipeline stage enforcing a [`CorsPolicy`].
#[derive(Debug, Clone)]
pub struct CorsStage {
    policy: CorsPolicy,
}

impl CorsStage {
    pub fn new(policy: CorsPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CorsPolicy {
        &self.policy
    }
}

impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageResult> {
        let flow = match self.policy.evaluate(ctx) {
            CorsDecision::NotCrossOrigin => Flow::Continue,
            CorsDecision::Rejected(reason) => {
                tracing::warn!(
                    origin = origin(ctx).unwrap_or_default(),
                    method = %ctx.method(),
                    path = %ctx.path(),
                    reason,
                    "Cross-origin request rejected"
                );
                Flow::Respond((StatusCode::FORBIDDEN, "Forbidden").into_response())
            }
            CorsDecision::Allowed => {
                let origin = origin(ctx).unwrap_or_default().to_string();
                self.policy.annotate_allowed(ctx, &origin);
                Flow::Continue
            }
            CorsDecision::Preflight => {
                let origin = origin(ctx).unwrap_or_default().to_string();
                self.policy.annotate_allowed(ctx, &origin);
                self.policy.annotate_preflight(ctx);
                Flow::Respond(preflight_response())
            }
        };
        Box::pin(async move { Ok(flow) })
    }
}

fn preflight_response() -> Response {
    (StatusCode::NO_CONTENT, [(header::CONTENT_LENGTH, "0")]).into_response()
}
