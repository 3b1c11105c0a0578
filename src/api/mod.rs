pub mod format;
pub mod repo;

use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::CONFIG;
use crate::repo::RepositoryService;

/// HTTP surface of the repository service.
pub fn app(service: RepositoryService) -> Router {
    let mut router: Router<RepositoryService> = Router::new()
        .route("/health", get(health))
        .merge(repo_routes());

    // Global middleware
    if CONFIG.server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    if CONFIG.server.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router.with_state(service)
}

fn repo_routes() -> Router<RepositoryService> {
    Router::new().route(
        "/repo/*path",
        get(repo::get)
            .post(repo::post)
            .put(repo::put)
            .patch(repo::patch)
            .delete(repo::delete),
    )
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
