//! API-key authentication middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::response::ApiError;
use crate::state::AppState;

/// Exact-match check of `X-Api-Key` against the configured secret. An
/// empty configured secret disables the check entirely.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.api_key.is_empty() {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get("X-Api-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided == state.api_key {
        next.run(request).await
    } else {
        warn!(path = %request.uri().path(), "rejected request with missing or invalid api key");
        ApiError::unauthorized().into_response()
    }
}
