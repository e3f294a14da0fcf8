//! Structured body decoding.
//!
//! # Responsibilities
//! - Decode `application/json` (and `+json`) payloads
//! - Decode `application/x-www-form-urlencoded` payloads
//! - Enforce the configured size limit while reading
//!
//! # Design Decisions
//! - Other content types are left unread and streamed to the route group
//! - JSON must be an object or array; scalars are rejected as malformed
//! - The buffered bytes are kept so handlers can still read the raw body
//! - Form pairs are kept flat in wire order; `ParsedBody::to_value` expands
//!   bracket keys (`a[b]=c`) into nested values

use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use futures_util::future::BoxFuture;
use futures_util::StreamExt;

use crate::pipeline::{Flow, ParsedBody, PipelineError, RequestContext, Stage, StageResult};

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

/// Decodes structured request bodies into [`ParsedBody`].
#[derive(Debug, Clone)]
pub struct BodyStage {
    limit: usize,
}

impl BodyStage {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    async fn buffer(&self, ctx: &mut RequestContext) -> Result<Option<Bytes>, PipelineError> {
        let Some(body) = ctx.take_body_stream() else {
            return Ok(None);
        };

        let mut buf = Vec::new();
        let mut stream = body.into_data_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PipelineError::BodyRead(e.to_string()))?;
            if buf.len() + chunk.len() > self.limit {
                return Err(PipelineError::BodyTooLarge { limit: self.limit });
            }
            buf.extend_from_slice(&chunk);
        }

        let bytes = Bytes::from(buf);
        ctx.set_buffered_body(bytes.clone());
        Ok(Some(bytes))
    }
}

impl Stage for BodyStage {
    fn name(&self) -> &'static str {
        "body"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            if ctx.parsed_body().is_some() {
                return Ok(Flow::Continue);
            }

            let Some(kind) = body_kind(ctx.headers()) else {
                ctx.set_parsed_body(ParsedBody::Absent);
                return Ok(Flow::Continue);
            };

            if declared_length(ctx.headers()).is_some_and(|len| len > self.limit) {
                return Err(PipelineError::BodyTooLarge { limit: self.limit });
            }

            let parsed = match self.buffer(ctx).await? {
                Some(bytes) if !bytes.is_empty() => decode(kind, &bytes)?,
                _ => ParsedBody::Absent,
            };
            ctx.set_parsed_body(parsed);
            Ok(Flow::Continue)
        })
    }
}

fn body_kind(headers: &HeaderMap) -> Option<BodyKind> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();

    if essence == JSON || (essence.starts_with("application/") && essence.ends_with("+json")) {
        Some(BodyKind::Json)
    } else if essence == FORM {
        Some(BodyKind::Form)
    } else {
        None
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn decode(kind: BodyKind, bytes: &[u8]) -> Result<ParsedBody, PipelineError> {
    match kind {
        BodyKind::Json => {
            let value: serde_json::Value =
                serde_json::from_slice(bytes).map_err(|e| PipelineError::MalformedBody {
                    content_type: JSON,
                    reason: e.to_string(),
                })?;
            if !(value.is_object() || value.is_array()) {
                return Err(PipelineError::MalformedBody {
                    content_type: JSON,
                    reason: "top-level value must be an object or array".to_string(),
                });
            }
            Ok(ParsedBody::Json(value))
        }
        BodyKind::Form => {
            let pairs = url::form_urlencoded::parse(bytes).into_owned().collect();
            Ok(ParsedBody::Form(pairs))
        }
    }
}
