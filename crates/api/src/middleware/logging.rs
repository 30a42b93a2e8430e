//! Request logging with request-ID and client-IP correlation.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::info;

use crate::extractors::ClientIp;
use crate::middleware::request_id::RequestId;

/// Logs request start and finish. Health probes are exempt to keep the
/// log readable.
pub async fn log_requests(ClientIp(client_ip): ClientIp, request: Request, next: Next) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| "unknown".to_string());

    info!(request_id = %request_id, client_ip = %client_ip, "{method} {uri}");

    let start = Instant::now();
    let response = next.run(request).await;

    info!(
        request_id = %request_id,
        client_ip = %client_ip,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "{method} {uri} finished"
    );
    response
}
