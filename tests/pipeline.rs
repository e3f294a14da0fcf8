//! End-to-end behavior of the request pipeline through the axum router.

mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Extension;
use axum::http::{header, Method, Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceExt;

use common::{app, body_text, get as get_request, HitCounter, LogCapture};
use expense_server::config::AppConfig;
use expense_server::http::middleware::{BodyStage, ObserveStage};
use expense_server::pipeline::{Chain, FnStage, Flow, HandlerFailure, ParsedBody, RequestContext, StageResult};

#[tokio::test]
async fn test_every_request_logged_once_on_entry() {
    let (logs, _guard) = LogCapture::install();
    let mut config = AppConfig::default();
    config.cors.allowed_origins = vec!["https://example.com".into()];
    let counter = HitCounter::default();
    let router = app(config, vec![("/group", counter.group())]).router();

    // Served by a group.
    let response = router.clone().oneshot(get_request("/group/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Unmatched.
    let response = router.clone().oneshot(get_request("/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Rejected by the cross-origin policy.
    let request = Request::builder()
        .uri("/group/2")
        .header(header::ORIGIN, "https://evil.com")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Failed in body parsing.
    let request = Request::builder()
        .method(Method::POST)
        .uri("/group/3")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{oops"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(logs.entry_lines("GET", "/group/1"), 1);
    assert_eq!(logs.entry_lines("GET", "/missing"), 1);
    assert_eq!(logs.entry_lines("GET", "/group/2"), 1);
    assert_eq!(logs.entry_lines("POST", "/group/3"), 1);
    assert_eq!(counter.hits(), 1);
}

#[tokio::test]
async fn test_unmatched_path_never_reaches_a_handler() {
    let counter = HitCounter::default();
    let router = app(AppConfig::default(), vec![("/group", counter.group())]).router();

    for path in ["/", "/groups", "/nowhere/group", "/Group/1"] {
        let response = router.clone().oneshot(get_request(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body_text(response).await, "Not Found");
    }
    assert_eq!(counter.hits(), 0);
}

#[tokio::test]
async fn test_malformed_body_halts_before_authentication() {
    let reached = Arc::new(AtomicBool::new(false));
    let probe = Arc::clone(&reached);
    let chain = Chain::builder()
        .register(ObserveStage::new())
        .register(BodyStage::new(1024))
        .register(FnStage::new("authenticate", move |_ctx: &mut RequestContext| -> StageResult {
            probe.store(true, Ordering::SeqCst);
            Ok(Flow::Continue)
        }))
        .build();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/expense")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("[1, 2"))
        .unwrap();
    let response = chain.dispatch(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Bad Request");
    assert!(!reached.load(Ordering::SeqCst));

    let counter = HitCounter::default();
    let router = app(AppConfig::default(), vec![("/expense", counter.group())]).router();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/expense")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::CONTENT_LENGTH, "999999999")
        .body(Body::from("a=1"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(counter.hits(), 0);
}

#[tokio::test]
async fn test_wildcard_origin_with_credentials() {
    let router = app(AppConfig::default(), vec![("/group", HitCounter::default().group())]).router();

    for origin in ["https://example.com", "http://localhost:3000", "https://evil.com"] {
        let request = Request::builder()
            .uri("/group")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], origin);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }
}

#[tokio::test]
async fn test_reflected_origin_varies_alongside_handler_vary() {
    let group = Router::new().route(
        "/",
        get(|| async { ([(header::VARY, "Accept-Encoding")], "hit") }),
    );
    let router = app(AppConfig::default(), vec![("/group", group)]).router();

    let request = Request::builder()
        .uri("/group")
        .header(header::ORIGIN, "https://a.example")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://a.example");
    let vary = response
        .headers()
        .get_all(header::VARY)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(vary, vec!["Accept-Encoding", "Origin"]);
}

#[tokio::test]
async fn test_restrictive_origin_rejected_before_routing() {
    let mut config = AppConfig::default();
    config.cors.allowed_origins = vec!["https://example.com".into()];
    let counter = HitCounter::default();
    let router = app(config, vec![("/group", counter.group())]).router();

    let request = Request::builder()
        .uri("/group/1")
        .header(header::ORIGIN, "https://evil.com")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    // Hardening headers still apply to the rejection.
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(counter.hits(), 0);

    let request = Request::builder()
        .uri("/group/1")
        .header(header::ORIGIN, "https://example.com")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(counter.hits(), 1);
}

#[tokio::test]
async fn test_preflight_answered_without_routing() {
    let counter = HitCounter::default();
    let router = app(AppConfig::default(), vec![("/expense", counter.group())]).router();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/expense/7")
        .header(header::ORIGIN, "https://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .split(',')
        .collect::<HashSet<_>>();
    assert!(methods.contains("DELETE"));
    assert_eq!(counter.hits(), 0);
}

#[tokio::test]
async fn test_handler_error_is_logged_not_leaked() {
    let (logs, _guard) = LogCapture::install();
    let group = Router::new()
        .route(
            "/fail",
            get(|| async { Err::<&str, _>(HandlerFailure::new("connection refused by db-primary:5432")) }),
        )
        .route(
            "/panic",
            get(|| async {
                if true {
                    panic!("ledger out of balance");
                }
                "unreachable"
            }),
        );
    let router = app(AppConfig::default(), vec![("/expense", group)]).router();

    let response = router.clone().oneshot(get_request("/expense/fail")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert_eq!(body, "Internal Server Error");
    assert!(!body.contains("db-primary"));
    assert_eq!(logs.occurrences("connection refused by db-primary:5432"), 1);
    assert_eq!(logs.occurrences("Error: connection refused by db-primary:5432"), 1);

    let response = router.oneshot(get_request("/expense/panic")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(!body.contains("ledger"));
    assert_eq!(logs.occurrences("Error: ledger out of balance"), 1);
}

#[tokio::test]
async fn test_group_not_found_after_all_global_stages() {
    let (logs, _guard) = LogCapture::install();
    let group = Router::new().route("/{id}", get(|| async { "group detail" }));
    let router = app(AppConfig::default(), vec![("/group", group)]).router();

    let request = Request::builder()
        .uri("/group/anything/else")
        .header(header::ORIGIN, "https://app.example")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    // The group's own fallback answered, not the boundary.
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(logs.occurrences("Request rejected"), 0);

    // observe, harden and cors all left their mark on the way in.
    assert_eq!(logs.entry_lines("GET", "/group/anything/else"), 1);
    let headers = response.headers();
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example");
}

#[tokio::test]
async fn test_parsed_body_and_cookies_reach_handlers() {
    let group = Router::new().route(
        "/",
        post(
            |Extension(body): Extension<ParsedBody>,
             Extension(cookies): Extension<expense_server::pipeline::Cookies>| async move {
                format!(
                    "{}|{}",
                    body.field("amount").unwrap_or("-"),
                    cookies.get("session").unwrap_or("-")
                )
            },
        ),
    );
    let router = app(AppConfig::default(), vec![("/expense", group)]).router();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/expense")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, "session=abc%20def")
        .body(Body::from(r#"{"amount":"12.50"}"#))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(body_text(response).await, "12.50|abc def");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/expense")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("amount=3&note=lunch"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(body_text(response).await, "3|-");
}

#[tokio::test]
async fn test_request_id_propagated() {
    let router = app(AppConfig::default(), vec![("/group", HitCounter::default().group())]).router();

    let request = Request::builder()
        .uri("/group")
        .header("x-request-id", "trace-123")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-123");
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_request_keeps_transport_headers() {
    let mut config = AppConfig::default();
    config.timeouts.request_secs = 1;
    let group = Router::new().route(
        "/",
        get(|| async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            "late"
        }),
    );
    let router = app(config, vec![("/group", group)]).router();

    let request = Request::builder()
        .uri("/group")
        .header("x-request-id", "slow-1")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(response.headers()["x-request-id"], "slow-1");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}
