//! Defensive response headers.
//!
//! # Responsibilities
//! - Annotate every response with the standard hardening header set
//!
//! # Design Decisions
//! - Headers are recorded before body or cookie parsing so even early
//!   rejections carry them
//! - A handler that sets one of these headers itself keeps its own value

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use futures_util::future::BoxFuture;

use crate::config::SecurityConfig;
use crate::pipeline::{Flow, RequestContext, Stage, StageResult};

const DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
         form-action 'self';frame-ancestors 'self';img-src 'self' data:;\
         object-src 'none';script-src 'self';script-src-attr 'none';\
         style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Applies the hardening header set.
#[derive(Debug, Clone)]
pub struct HardenStage {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl HardenStage {
    /// The full default header set.
    pub fn new() -> Self {
        let headers = DEFAULT_HEADERS
            .iter()
            .map(|&(name, value)| {
                (
                    HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                )
            })
            .collect();
        Self { headers }
    }

    /// Honors `security.enable_headers`; a disabled stage adds nothing.
    pub fn from_config(config: &SecurityConfig) -> Self {
        if config.enable_headers {
            Self::new()
        } else {
            Self {
                headers: Vec::new(),
            }
        }
    }

    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    /// Add the set to a response built outside the chain (transport
    /// timeouts). Headers already present are kept.
    pub fn apply_missing(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
}

impl Default for HardenStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for HardenStage {
    fn name(&self) -> &'static str {
        "harden"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageResult> {
        for (name, value) in &self.headers {
            ctx.annotate(name.clone(), value.clone());
        }
        Box::pin(async { Ok(Flow::Continue) })
    }
}
