//! API documentation group.
//!
//! Serves a placeholder OpenAPI document listing the mounted prefixes. It
//! is mounted after the domain groups.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::routes::DOMAIN_PREFIXES;

pub const PREFIX: &str = "/api-docs";

pub fn router() -> Router {
    Router::new().route("/", get(document))
}

async fn document() -> Json<Value> {
    let paths: serde_json::Map<String, Value> = DOMAIN_PREFIXES
        .iter()
        .map(|prefix| (prefix.to_string(), json!({})))
        .collect();

    Json(json!({
        "openapi": "3.0.0",
        "info": {
            "title": "Expense Server API",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": paths,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_document_lists_prefixes() {
        let response = router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doc: Value = serde_json::from_slice(&body).unwrap();
        assert!(doc["paths"]["/expense"].is_object());
    }
}
