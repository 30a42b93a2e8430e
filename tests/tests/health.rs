//! Health endpoint and auth middleware tests.
//!
//! Requires Docker for the ClickHouse testcontainer.

use axum_test::TestServer;
use integration_tests::{fixtures, setup::TestContext};

#[tokio::test]
async fn health_reports_queue_counters() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert!(body["enqueued"].is_u64());
    assert!(body["dropped"].is_u64());
    assert!(body["pending"].is_u64());

    // Counters move after an ingest.
    let line = fixtures::event_line("2026-02-06T23:01:02Z", "users", "user.created");
    server
        .post("/v1/events")
        .text(fixtures::ndjson(&[line]))
        .await
        .assert_status_ok();

    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["enqueued"], 1);
}

#[tokio::test]
async fn api_key_gates_the_v1_surface() {
    let ctx = TestContext::with_api_key("sekrit").await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    // Health stays open.
    server.get("/health").await.assert_status_ok();

    let response = server.get("/v1/events").await;
    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "unauthorized");

    let response = server
        .get("/v1/events")
        .add_header("X-Api-Key", "wrong")
        .await;
    response.assert_status_unauthorized();

    let response = server
        .get("/v1/events")
        .add_header("X-Api-Key", "sekrit")
        .await;
    response.assert_status_ok();
}
