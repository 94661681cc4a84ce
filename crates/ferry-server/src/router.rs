use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all ferry endpoints.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route(
            "/v1/buckets",
            get(handler::list_buckets).post(handler::create_bucket),
        )
        .route("/v1/buckets/:bucket", axum::routing::delete(handler::delete_bucket))
        .route("/v1/objects/:bucket", get(handler::list_objects))
        .route(
            "/v1/objects/:bucket/*name",
            get(handler::get_object).put(handler::put_object),
        )
        .route("/v1/stat/:bucket/*name", get(handler::stat_object))
        .route("/v1/upload", post(handler::upload_part))
        .route("/v1/dedup/by-id/:identifier", get(handler::dedup_by_identifier))
        .route(
            "/v1/dedup/by-location/:bucket/*name",
            get(handler::dedup_by_location),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
