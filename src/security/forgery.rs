//! Request-forgery protection (double-submit token).
//!
//! # Responsibilities
//! - Issue a token cookie on safe requests that do not carry one
//! - Reject state-changing requests whose submitted token does not match
//!   the cookie
//!
//! # Design Decisions
//! - Runs after cookie and body parsing so both token sources are decoded
//! - Only mounted when `csrf.enabled` is set; the chain is identical
//!   otherwise
//! - Rejections are a 403 short-circuit, not an error value

use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::config::CsrfConfig;
use crate::pipeline::{Flow, RequestContext, Stage, StageResult};

/// Body field checked when the header is absent.
pub const BODY_FIELD: &str = "_csrf";

/// The token valid for this request, exposed to route groups so they can
/// embed it in responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

/// Double-submit token check.
#[derive(Debug, Clone)]
pub struct ForgeryStage {
    cookie_name: String,
    header_name: HeaderName,
}

impl ForgeryStage {
    pub fn new(cookie_name: impl Into<String>, header_name: HeaderName) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            header_name,
        }
    }

    /// Returns `None` when protection is disabled.
    pub fn from_config(config: &CsrfConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let header_name = HeaderName::from_bytes(config.header_name.as_bytes()).ok()?;
        Some(Self::new(config.cookie_name.clone(), header_name))
    }

    fn submitted<'c>(&self, ctx: &'c RequestContext) -> Option<&'c str> {
        ctx.headers()
            .get(&self.header_name)
            .and_then(|v| v.to_str().ok())
            .or_else(|| ctx.parsed_body().and_then(|b| b.field(BODY_FIELD)))
    }

    fn issue(&self, ctx: &mut RequestContext) {
        let token = Uuid::new_v4().simple().to_string();
        let cookie = format!("{}={}; Path=/; SameSite=Strict", self.cookie_name, token);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            ctx.annotate_append(header::SET_COOKIE, value);
        }
        ctx.extensions_mut().insert(CsrfToken(token));
    }
}

fn is_safe(method: &Method) -> bool {
    [Method::GET, Method::HEAD, Method::OPTIONS].contains(method)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl Stage for ForgeryStage {
    fn name(&self) -> &'static str {
        "forgery"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageResult> {
        let expected = ctx.cookies().get(&self.cookie_name).map(str::to_owned);

        let flow = if is_safe(ctx.method()) {
            match expected {
                Some(token) => {
                    ctx.extensions_mut().insert(CsrfToken(token));
                }
                None => self.issue(ctx),
            }
            Flow::Continue
        } else {
            let valid = match (expected.as_deref(), self.submitted(ctx)) {
                (Some(expected), Some(submitted)) => {
                    constant_time_eq(expected.as_bytes(), submitted.as_bytes())
                }
                _ => false,
            };
            if valid {
                Flow::Continue
            } else {
                tracing::warn!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    "Request rejected: missing or invalid anti-forgery token"
                );
                Flow::Respond((StatusCode::FORBIDDEN, "Forbidden").into_response())
            }
        };
        Box::pin(async move { Ok(flow) })
    }
}
