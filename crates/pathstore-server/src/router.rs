use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handler;
use crate::state::AppState;

/// Build the axum router with all pathstore endpoints.
///
/// `/data/export` and `/docs/export` are static routes and win over the
/// `/data/*path` wildcard, so a document literally named `export` is only
/// reachable for writes.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(handler::health_handler))
        .route("/data/export", get(handler::export_handler))
        .route("/docs/export", get(handler::export_handler))
        .route(
            "/data/*path",
            get(handler::load_document)
                .head(handler::document_exists)
                .post(handler::save_document)
                .put(handler::combine_document),
        )
        .route("/shorten", post(handler::shorten))
        .route("/s/:code", get(handler::redirect))
        .route("/stats/:code", get(handler::link_stats))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
