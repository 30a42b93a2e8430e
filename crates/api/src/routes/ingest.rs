//! NDJSON ingest endpoint.

use std::io::Read;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use flate2::read::GzDecoder;
use monitor_core::Event;
use pipeline::EventQueue;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::response::ApiError;
use crate::state::AppState;

/// Hard request-body ceiling, enforced by the router's body limit.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// A single NDJSON line may not exceed this.
const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub accepted: usize,
}

/// POST /v1/events - NDJSON ingest, optionally gzipped.
///
/// Lines are enqueued as they parse; the first bad line fails the request
/// with its 1-based number, leaving earlier lines in the queue.
pub async fn ingest_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    let raw = decode_body(&headers, body)?;
    let accepted = parse_and_enqueue(&state.queue, &raw)?;

    debug!(accepted, "ingested events");
    Ok(Json(IngestResponse { accepted }))
}

/// Unwraps gzip when `Content-Encoding` mentions it, case-insensitively.
fn decode_body(headers: &HeaderMap, body: Bytes) -> Result<Bytes, ApiError> {
    let encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !encoding.to_ascii_lowercase().contains("gzip") {
        return Ok(body);
    }

    let mut decoded = Vec::new();
    GzDecoder::new(body.as_ref())
        .read_to_end(&mut decoded)
        .map_err(|e| ApiError::bad_request(format!("failed to read gzip body: {e}")))?;
    Ok(Bytes::from(decoded))
}

/// Scans NDJSON, validating and enqueueing each non-empty line.
fn parse_and_enqueue(queue: &EventQueue, body: &[u8]) -> Result<usize, ApiError> {
    let mut count = 0;

    for (idx, line) in body.split(|b| *b == b'\n').enumerate() {
        let line_num = idx + 1;
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        if line.is_empty() {
            continue;
        }
        if line.len() > MAX_LINE_BYTES {
            return Err(ApiError::bad_request(format!(
                "line {line_num}: exceeds maximum line size"
            )));
        }

        let event: Event = serde_json::from_slice(line)
            .map_err(|e| ApiError::bad_request(format!("line {line_num}: invalid json: {e}")))?;

        event
            .validate()
            .map_err(|e| ApiError::bad_request(format!("line {line_num}: {e}")))?;

        queue.enqueue(event);
        count += 1;
    }

    Ok(count)
}
