//! API routes.

pub mod analytics;
pub mod health;
pub mod ingest;
pub mod query;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::middleware::{auth, logging, request_id};
use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let v1 = Router::new()
        .route(
            "/events",
            post(ingest::ingest_handler).get(query::search_handler),
        )
        .route("/labels/:label/values", get(query::label_values_handler))
        .route("/data/keys", get(query::data_keys_handler))
        .route("/data/values", get(query::data_values_handler))
        .route(
            "/analytics",
            post(analytics::analytics_post).get(analytics::analytics_get),
        )
        .route(
            "/timeseries",
            post(analytics::timeseries_post).get(analytics::timeseries_get),
        )
        .route(
            "/topn",
            post(analytics::topn_post).get(analytics::topn_get),
        )
        .route(
            "/gauge",
            post(analytics::gauge_post).get(analytics::gauge_get),
        )
        .route(
            "/compare",
            post(analytics::compare_post).get(analytics::compare_get),
        )
        .layer(from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/v1", v1)
        .layer(DefaultBodyLimit::max(ingest::MAX_BODY_BYTES))
        .layer(from_fn(logging::log_requests))
        .layer(from_fn(request_id::set_request_id))
        .layer(cors)
        .with_state(state)
}
