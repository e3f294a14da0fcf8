//! Extractors for route handlers that require or accept a principal.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::auth::registry::Authenticator;
use crate::auth::strategy::{AuthError, Principal};
use crate::http::middleware::parse_cookies;
use crate::pipeline::{Cookies, HandlerFailure};

/// Why an extractor refused the request.
#[derive(Debug)]
pub enum AuthRejection {
    /// Verification failed; answered by the route with 401.
    Unauthorized(AuthError),
    /// The authenticate stage did not run for this request.
    MissingAuthenticator,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
                "Unauthorized",
            )
                .into_response(),
            AuthRejection::MissingAuthenticator => {
                HandlerFailure::new("authenticator not attached to request").into_response()
            }
        }
    }
}

fn verify(parts: &mut Parts) -> Result<Result<Principal, AuthError>, AuthRejection> {
    let authenticator = parts
        .extensions
        .get::<Authenticator>()
        .cloned()
        .ok_or(AuthRejection::MissingAuthenticator)?;
    let cookies = parts
        .extensions
        .get::<Cookies>()
        .cloned()
        .unwrap_or_else(|| parse_cookies(&parts.headers));

    let result = authenticator.authenticate(&parts.headers, &cookies);
    if let Ok(principal) = &result {
        parts.extensions.insert(principal.clone());
    }
    Ok(result)
}

/// A verified principal. Rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match verify(parts)? {
            Ok(principal) => Ok(Authenticated(principal)),
            Err(err) => {
                tracing::debug!(path = %parts.uri.path(), error = %err, "Authentication failed");
                Err(AuthRejection::Unauthorized(err))
            }
        }
    }
}

/// A principal if the caller presented a valid credential, `None` otherwise.
#[derive(Debug, Clone)]
pub struct MaybeAuthenticated(pub Option<Principal>);

impl<S> FromRequestParts<S> for MaybeAuthenticated
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthenticated(verify(parts)?.ok()))
    }
}
