//! Per-request state threaded through the stages.
//!
//! A [`RequestContext`] is created when the chain receives a request and is
//! dropped once a response has been finalized. It is owned by the single
//! task serving that request; nothing here is shared across requests.

use std::collections::HashMap;

use axum::body::{Body, Bytes};
use axum::http::{header, Extensions, HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use axum::response::Response;
use serde_json::{Map, Value};

use crate::http::request::{RequestId, X_REQUEST_ID};

/// Decoded request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ParsedBody {
    /// No structured payload was declared, or it was empty.
    #[default]
    Absent,
    /// `application/json` payload (object or array).
    Json(Value),
    /// `application/x-www-form-urlencoded` payload, in wire order.
    Form(Vec<(String, String)>),
}

impl ParsedBody {
    /// Look up a top-level string field in a JSON object or form payload.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            ParsedBody::Absent => None,
            ParsedBody::Json(value) => value.get(name).and_then(Value::as_str),
            ParsedBody::Form(pairs) => pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
        }
    }

    /// The payload as one JSON value.
    ///
    /// Form keys in bracket notation are expanded: `a[b]=c` becomes
    /// `{"a":{"b":"c"}}` and `a[]=1&a[]=2` becomes `{"a":["1","2"]}`.
    /// A repeated plain key collects its values into an array.
    pub fn to_value(&self) -> Value {
        match self {
            ParsedBody::Absent => Value::Null,
            ParsedBody::Json(value) => value.clone(),
            ParsedBody::Form(pairs) => {
                let mut root = Value::Object(Map::new());
                for (key, value) in pairs {
                    insert_form_value(&mut root, &form_key_segments(key), value);
                }
                root
            }
        }
    }
}

const MAX_FORM_DEPTH: usize = 5;

// `a[b][]` -> ["a", "b", ""]. Keys that are not well-formed bracket paths
// stay flat; nesting past the depth limit is kept as one literal segment.
fn form_key_segments(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[').filter(|&i| i > 0) else {
        return vec![key];
    };
    let mut segments = vec![&key[..open]];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        if segments.len() > MAX_FORM_DEPTH {
            segments.push(rest);
            return segments;
        }
        let Some(close) = inner.find(']') else {
            return vec![key];
        };
        segments.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    if rest.is_empty() {
        segments
    } else {
        vec![key]
    }
}

fn insert_form_value(slot: &mut Value, segments: &[&str], value: &str) {
    let Some((&segment, rest)) = segments.split_first() else {
        match slot {
            Value::Null => *slot = Value::String(value.to_string()),
            Value::Array(items) => items.push(Value::String(value.to_string())),
            Value::String(_) => {
                let first = slot.take();
                *slot = Value::Array(vec![first, Value::String(value.to_string())]);
            }
            // Conflicts with an existing nested value; the first shape wins.
            _ => {}
        }
        return;
    };

    if segment.is_empty() {
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            items.push(Value::Null);
            if let Some(last) = items.last_mut() {
                insert_form_value(last, rest, value);
            }
        }
        return;
    }

    if slot.is_null() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(map) = slot {
        let child = map.entry(segment.to_string()).or_insert(Value::Null);
        insert_form_value(child, rest, value);
    }
}

/// Cookies sent with the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    values: HashMap<String, String>,
}

impl Cookies {
    pub(crate) fn from_map(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Decoded value of the named cookie.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Decode a `j:`-prefixed JSON cookie.
    pub fn json(&self, name: &str) -> Option<Value> {
        self.get(name)
            .and_then(|v| v.strip_prefix("j:"))
            .and_then(|v| serde_json::from_str(v).ok())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Request body before and after the body stage has looked at it.
enum RawBody {
    Stream(Body),
    Buffered(Bytes),
    Taken,
}

/// State for one inbound request.
pub struct RequestContext {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    extensions: Extensions,
    body: RawBody,
    parsed_body: Option<ParsedBody>,
    cookies: Cookies,
    request_id: Option<RequestId>,
    route_group: Option<String>,
    annotations: HeaderMap,
}

impl RequestContext {
    /// Split an inbound request into a fresh context.
    pub fn from_request(request: Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            extensions: parts.extensions,
            body: RawBody::Stream(body),
            parsed_body: None,
            cookies: Cookies::default(),
            request_id: None,
            route_group: None,
            annotations: HeaderMap::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Capabilities handed to the route group (e.g. the authenticator).
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// The decoded body, or `None` if the body stage has not run.
    pub fn parsed_body(&self) -> Option<&ParsedBody> {
        self.parsed_body.as_ref()
    }

    pub fn set_parsed_body(&mut self, body: ParsedBody) {
        self.parsed_body = Some(body);
    }

    /// Take the unread body stream. Returns `None` if it was already taken
    /// or buffered.
    pub fn take_body_stream(&mut self) -> Option<Body> {
        match std::mem::replace(&mut self.body, RawBody::Taken) {
            RawBody::Stream(body) => Some(body),
            other => {
                self.body = other;
                None
            }
        }
    }

    /// Keep the buffered bytes so the route group can still read them.
    pub fn set_buffered_body(&mut self, bytes: Bytes) {
        self.body = RawBody::Buffered(bytes);
    }

    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    pub fn set_cookies(&mut self, cookies: Cookies) {
        self.cookies = cookies;
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn set_request_id(&mut self, id: RequestId) {
        if let Ok(value) = HeaderValue::from_str(id.as_str()) {
            self.annotate(X_REQUEST_ID.clone(), value);
        }
        self.request_id = Some(id);
    }

    /// Prefix of the route group that served the request.
    pub fn route_group(&self) -> Option<&str> {
        self.route_group.as_deref()
    }

    pub fn set_route_group(&mut self, prefix: impl Into<String>) {
        self.route_group = Some(prefix.into());
    }

    /// Record a header for the eventual response, replacing earlier
    /// annotations of the same name.
    pub fn annotate(&mut self, name: HeaderName, value: HeaderValue) {
        self.annotations.insert(name, value);
    }

    /// Record an additional value for a multi-valued header.
    pub fn annotate_append(&mut self, name: HeaderName, value: HeaderValue) {
        self.annotations.append(name, value);
    }

    pub fn annotations(&self) -> &HeaderMap {
        &self.annotations
    }

    /// Apply the recorded annotations to the finalized response.
    ///
    /// Single-valued headers the responder already set are left alone.
    /// `Set-Cookie` values are added alongside the responder's, and `Vary`
    /// gains any field names it does not list yet.
    pub fn finalize(&self, mut response: Response) -> Response {
        let headers = response.headers_mut();
        for name in self.annotations.keys() {
            let values = self.annotations.get_all(name);
            if *name == header::SET_COOKIE || !headers.contains_key(name) {
                for value in values {
                    headers.append(name.clone(), value.clone());
                }
            } else if *name == header::VARY {
                for value in values {
                    if !lists_vary_field(headers, value) {
                        headers.append(header::VARY, value.clone());
                    }
                }
            }
        }
        response
    }

    /// Build the request handed to the route group at `uri`.
    ///
    /// Moves the body and the stage-attached extensions out of the context;
    /// the context keeps what it needs to finalize the response.
    pub(crate) fn delegated_request(
        &mut self,
        uri: Uri,
    ) -> Result<Request<Body>, axum::http::Error> {
        let body = match std::mem::replace(&mut self.body, RawBody::Taken) {
            RawBody::Stream(body) => body,
            RawBody::Buffered(bytes) => Body::from(bytes),
            RawBody::Taken => Body::empty(),
        };

        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .version(self.version)
            .body(body)?;

        *request.headers_mut() = self.headers.clone();
        let extensions = request.extensions_mut();
        *extensions = std::mem::take(&mut self.extensions);
        extensions.insert(axum::extract::OriginalUri(self.uri.clone()));
        extensions.insert(self.cookies.clone());
        extensions.insert(self.parsed_body.clone().unwrap_or_default());
        if let Some(id) = &self.request_id {
            extensions.insert(id.clone());
        }

        Ok(request)
    }
}

fn lists_vary_field(headers: &HeaderMap, field: &HeaderValue) -> bool {
    let Ok(field) = field.to_str() else {
        return false;
    };
    headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|listed| listed == "*" || listed.eq_ignore_ascii_case(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::RequestIdExt;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;

    fn context() -> RequestContext {
        RequestContext::from_request(
            Request::builder()
                .method(Method::POST)
                .uri("/group/42?expand=1")
                .body(Body::from("payload"))
                .unwrap(),
        )
    }

    #[test]
    fn test_finalize_keeps_responder_headers() {
        let mut ctx = context();
        ctx.annotate(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        ctx.annotate(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

        let response = (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "max-age=60")],
            "ok",
        )
            .into_response();
        let response = ctx.finalize(response);

        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=60");
    }

    #[test]
    fn test_finalize_merges_list_headers() {
        let mut ctx = context();
        ctx.annotate_append(header::VARY, HeaderValue::from_static("Origin"));
        ctx.annotate_append(header::VARY, HeaderValue::from_static("accept-encoding"));
        ctx.annotate_append(header::SET_COOKIE, HeaderValue::from_static("_csrf=abc; Path=/"));

        let response = (
            StatusCode::OK,
            [
                (header::VARY, "Accept-Encoding"),
                (header::SET_COOKIE, "session=1; Path=/"),
            ],
        )
            .into_response();
        let response = ctx.finalize(response);

        let values = |name: HeaderName| -> Vec<String> {
            response
                .headers()
                .get_all(name)
                .iter()
                .map(|v| v.to_str().unwrap().to_string())
                .collect()
        };
        assert_eq!(values(header::VARY), vec!["Accept-Encoding", "Origin"]);
        assert_eq!(
            values(header::SET_COOKIE),
            vec!["session=1; Path=/", "_csrf=abc; Path=/"]
        );
    }

    #[test]
    fn test_annotate_append_keeps_all_values() {
        let mut ctx = context();
        ctx.annotate_append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        ctx.annotate_append(header::SET_COOKIE, HeaderValue::from_static("b=2"));

        let response = ctx.finalize(StatusCode::OK.into_response());
        assert_eq!(response.headers().get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn test_body_stream_taken_once() {
        let mut ctx = context();
        assert!(ctx.take_body_stream().is_some());
        assert!(ctx.take_body_stream().is_none());

        ctx.set_buffered_body(Bytes::from_static(b"x"));
        assert!(ctx.take_body_stream().is_none());
    }

    #[test]
    fn test_delegated_request_carries_capabilities() {
        let mut ctx = context();
        ctx.set_parsed_body(ParsedBody::Form(vec![("a".into(), "1".into())]));
        ctx.set_request_id(RequestId::new("req-1"));

        let request = ctx
            .delegated_request(Uri::from_static("/42?expand=1"))
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri().path(), "/42");
        let original = request.extensions().get::<axum::extract::OriginalUri>().unwrap();
        assert_eq!(original.0.path(), "/group/42");
        assert_eq!(
            request.extensions().get::<ParsedBody>().unwrap().field("a"),
            Some("1")
        );
        assert_eq!(request.request_id().unwrap().as_str(), "req-1");
    }

    #[test]
    fn test_form_brackets_expand_to_nested_value() {
        let pair = |k: &str, v: &str| (k.to_string(), v.to_string());
        let body = ParsedBody::Form(vec![
            pair("expense[amount]", "12"),
            pair("expense[split][]", "alice"),
            pair("expense[split][]", "bob"),
            pair("tag", "food"),
            pair("tag", "team"),
            pair("broken[key", "kept"),
        ]);

        assert_eq!(
            body.to_value(),
            serde_json::json!({
                "expense": {"amount": "12", "split": ["alice", "bob"]},
                "tag": ["food", "team"],
                "broken[key": "kept",
            })
        );
        // Flat lookup still sees the raw keys.
        assert_eq!(body.field("expense[amount]"), Some("12"));
    }

    #[test]
    fn test_form_nesting_depth_is_capped() {
        let body = ParsedBody::Form(vec![("a[b][c][d][e][f][g]".into(), "x".into())]);
        assert_eq!(
            body.to_value(),
            serde_json::json!({"a": {"b": {"c": {"d": {"e": {"f": {"[g]": "x"}}}}}}})
        );
    }

    #[test]
    fn test_json_cookie() {
        let mut values = HashMap::new();
        values.insert("prefs".to_string(), "j:{\"theme\":\"dark\"}".to_string());
        values.insert("plain".to_string(), "j:not-json".to_string());
        let cookies = Cookies::from_map(values);

        assert_eq!(cookies.json("prefs").unwrap()["theme"], "dark");
        assert!(cookies.json("plain").is_none());
    }
}
