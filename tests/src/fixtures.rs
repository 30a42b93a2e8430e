//! Shared test data builders.

use std::io::Write;

use chrono::{DateTime, Utc};
use monitor_core::Event;
use serde_json::{json, Value};
use uuid::Uuid;

/// A fresh hyphenated UUID string.
pub fn test_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// One NDJSON line with the required fields and valid IDs.
pub fn event_line(timestamp: &str, service: &str, name: &str) -> String {
    json!({
        "timestamp": timestamp,
        "service": service,
        "name": name,
        "env": "prod",
        "job_id": test_uuid(),
        "request_id": test_uuid(),
        "trace_id": test_uuid(),
    })
    .to_string()
}

/// A typed event for direct store seeding.
pub fn event(timestamp: DateTime<Utc>, service: &str, name: &str, data: Value) -> Event {
    Event {
        timestamp,
        service: service.into(),
        env: "prod".into(),
        name: name.into(),
        level: "info".into(),
        data,
        ..Default::default()
    }
}

/// NDJSON body from individual lines.
pub fn ndjson(lines: &[String]) -> String {
    let mut body = lines.join("\n");
    body.push('\n');
    body
}

/// Gzip a request body.
pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes).expect("gzip write");
    encoder.finish().expect("gzip finish")
}
