//! Cookie header decoding.
//!
//! Never fails: a missing or garbled `Cookie` header yields an empty map,
//! and individual pairs that do not parse are skipped.

use std::collections::HashMap;

use axum::http::{header, HeaderMap};
use futures_util::future::BoxFuture;
use percent_encoding::percent_decode_str;

use crate::pipeline::{Cookies, Flow, RequestContext, Stage, StageResult};

/// Parses the `Cookie` header into [`Cookies`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieStage;

impl CookieStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for CookieStage {
    fn name(&self) -> &'static str {
        "cookies"
    }

    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, StageResult> {
        let cookies = parse_cookies(ctx.headers());
        ctx.set_cookies(cookies);
        Box::pin(async { Ok(Flow::Continue) })
    }
}

/// Decode every `Cookie` header. The first occurrence of a name wins.
pub fn parse_cookies(headers: &HeaderMap) -> Cookies {
    let mut values = HashMap::new();

    for raw in headers.get_all(header::COOKIE) {
        let Ok(raw) = raw.to_str() else { continue };

        for pair in raw.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() || values.contains_key(name) {
                continue;
            }

            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            let decoded = percent_decode_str(value)
                .decode_utf8()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());

            values.insert(name.to_string(), decoded);
        }
    }

    Cookies::from_map(values)
}
