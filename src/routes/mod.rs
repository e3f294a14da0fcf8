//! Route groups mounted under the domain prefixes.
//!
//! Each group is an opaque `Router` that owns its own handlers and its own
//! not-found answer. The business handlers plug in here; the pipeline only
//! cares about the prefix each one is mounted at.

pub mod docs;

use axum::routing::get;
use axum::{Extension, Json, Router};

use crate::auth::{Authenticated, Principal};
use crate::lifecycle::ResourceHandle;
use crate::persistence::Database;

/// Top-level prefixes of the domain route groups, in mount order.
pub const DOMAIN_PREFIXES: [&str; 7] = [
    "/auth",
    "/group",
    "/invitation",
    "/expense",
    "/userCategoryLimit",
    "/subscription",
    "/category",
];

/// Shared pool handle as seen by handlers.
pub type DatabaseHandle = ResourceHandle<Database>;

/// The domain groups, each with access to the shared pool.
pub fn domain_groups(database: DatabaseHandle) -> Vec<(&'static str, Router)> {
    DOMAIN_PREFIXES
        .iter()
        .map(|&prefix| {
            let router = match prefix {
                "/auth" => auth_routes(),
                _ => Router::new(),
            };
            (prefix, router.layer(Extension(database.clone())))
        })
        .collect()
}

fn auth_routes() -> Router {
    Router::new().route("/me", get(me))
}

async fn me(Authenticated(principal): Authenticated) -> Json<Principal> {
    Json(principal)
}
