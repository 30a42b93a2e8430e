//! End-to-end query tests: search, operators, pagination, autocomplete.
//!
//! Requires Docker for the ClickHouse testcontainer.

use axum_test::TestServer;
use chrono::{Duration, TimeZone, Utc};
use integration_tests::{fixtures, setup::TestContext};
use serde_json::json;

/// Ten events one second apart with data.latency_ms 100..=1000.
async fn seed_latencies(ctx: &TestContext) {
    let base = Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap();
    let events: Vec<_> = (1..=10)
        .map(|i| {
            fixtures::event(
                base + Duration::seconds(i),
                "users",
                "db.query",
                json!({"latency_ms": (i * 100).to_string()}),
            )
        })
        .collect();
    ctx.seed(&events).await;
}

#[tokio::test]
async fn data_operator_filters_numerically() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    ctx.truncate().await;
    seed_latencies(&ctx).await;

    let response = server.get("/v1/events?data.latency_ms__gt=500").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["pagination"]["count"], 5);

    let events = body["data"].as_array().unwrap();
    assert_eq!(events.len(), 5);

    // Ordered by timestamp DESC means latencies come back descending too.
    let latencies: Vec<&str> = events
        .iter()
        .map(|e| e["data"]["latency_ms"].as_str().unwrap())
        .collect();
    assert_eq!(latencies, vec!["1000", "900", "800", "700", "600"]);
}

#[tokio::test]
async fn column_filters_and_operators() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    ctx.truncate().await;

    let base = Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap();
    ctx.seed(&[
        fixtures::event(base, "users", "user.created", json!({})),
        fixtures::event(base + Duration::seconds(1), "billing", "invoice.paid", json!({})),
        fixtures::event(base + Duration::seconds(2), "billing", "invoice.voided", json!({})),
    ])
    .await;

    let body: serde_json::Value = server
        .get("/v1/events?service=billing&name__startswith=invoice.")
        .await
        .json();
    assert_eq!(body["pagination"]["count"], 2);

    let body: serde_json::Value = server.get("/v1/events?service__neq=billing").await.json();
    assert_eq!(body["pagination"]["count"], 1);

    let body: serde_json::Value = server
        .get("/v1/events?service__in=users,billing")
        .await
        .json();
    assert_eq!(body["pagination"]["count"], 3);

    // Unknown filter fields are ignored, not an error.
    let body: serde_json::Value = server.get("/v1/events?nonsense=x").await.json();
    assert_eq!(body["pagination"]["count"], 3);

    // An injection attempt in a value stays bound and matches nothing.
    let response = server.get("/v1/events?service=%27%3B--%20DROP").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn pagination_links_preserve_filters() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    ctx.truncate().await;
    seed_latencies(&ctx).await;

    let body: serde_json::Value = server
        .get("/v1/events?service=users&limit=3&offset=3")
        .await
        .json();
    assert_eq!(body["pagination"]["count"], 10);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let next = body["pagination"]["next"].as_str().unwrap();
    assert!(next.contains("service=users"));
    assert!(next.contains("offset=6"));

    let previous = body["pagination"]["previous"].as_str().unwrap();
    assert!(previous.contains("offset=0"));
}

#[tokio::test]
async fn label_values_autocomplete() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    ctx.truncate().await;

    let base = Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap();
    ctx.seed(&[
        fixtures::event(base, "users", "user.created", json!({})),
        fixtures::event(base, "billing", "invoice.paid", json!({})),
    ])
    .await;

    let body: serde_json::Value = server.get("/v1/labels/service/values").await.json();
    assert_eq!(body["data"], json!(["billing", "users"]));

    // A filter on the label itself must not narrow its own autocomplete.
    let body: serde_json::Value = server
        .get("/v1/labels/service/values?service=users")
        .await
        .json();
    assert_eq!(body["data"], json!(["billing", "users"]));

    let response = server.get("/v1/labels/job_id/values").await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert!(body["message"].as_str().unwrap().contains("invalid label"));
}

#[tokio::test]
async fn data_keys_and_values_autocomplete() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    ctx.truncate().await;

    let base = Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap();
    ctx.seed(&[
        fixtures::event(base, "users", "user.created", json!({"plan": "pro", "region": "eu"})),
        fixtures::event(base, "users", "user.created", json!({"plan": "free"})),
    ])
    .await;

    let body: serde_json::Value = server.get("/v1/data/keys").await.json();
    assert_eq!(body["data"], json!(["plan", "region"]));

    let body: serde_json::Value = server.get("/v1/data/values?key=plan").await.json();
    assert_eq!(body["data"], json!(["free", "pro"]));

    let response = server.get("/v1/data/values").await;
    response.assert_status_bad_request();

    // Disallowed characters in a data filter key are rejected outright.
    let response = server.get("/v1/events?data.k%27__eq=x").await;
    response.assert_status_bad_request();
}
