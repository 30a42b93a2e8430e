//! End-to-end analytics tests: aggregations, time series, top-N, gauge,
//! and comparison.
//!
//! Requires Docker for the ClickHouse testcontainer.

use axum_test::TestServer;
use chrono::{Duration, TimeZone, Utc};
use integration_tests::{fixtures, setup::TestContext};
use serde_json::json;

#[tokio::test]
async fn timeseries_fills_zero_buckets() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    ctx.truncate().await;

    // 3 events in hour H, none in H+1, 5 in H+2.
    let h0 = Utc.with_ymd_and_hms(2026, 2, 6, 10, 0, 0).unwrap();
    let h2 = h0 + Duration::hours(2);
    let mut events = Vec::new();
    for i in 0..3 {
        events.push(fixtures::event(
            h0 + Duration::minutes(i),
            "users",
            "db.query",
            json!({}),
        ));
    }
    for i in 0..5 {
        events.push(fixtures::event(
            h2 + Duration::minutes(i),
            "users",
            "db.query",
            json!({}),
        ));
    }
    ctx.seed(&events).await;

    let response = server
        .post("/v1/timeseries")
        .json(&json!({
            "aggregation": "count",
            "interval": "hour",
            "from": h0.to_rfc3339(),
            "to": h2.to_rfc3339(),
            "fill_zeros": true,
        }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let series = body["data"].as_array().unwrap();
    assert_eq!(series.len(), 1);

    let points = series[0]["points"].as_array().unwrap();
    let values: Vec<f64> = points.iter().map(|p| p["value"].as_f64().unwrap()).collect();
    assert_eq!(values, vec![3.0, 0.0, 5.0]);
}

#[tokio::test]
async fn timeseries_ceilings_are_enforced() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

    // 91 days exceeds the range cap.
    let response = server
        .post("/v1/timeseries")
        .json(&json!({
            "aggregation": "count",
            "interval": "day",
            "from": from.to_rfc3339(),
            "to": (from + Duration::days(91)).to_rfc3339(),
        }))
        .await;
    response.assert_status_bad_request();

    // 30 days of minutes exceeds the bucket cap.
    let response = server
        .post("/v1/timeseries")
        .json(&json!({
            "aggregation": "count",
            "interval": "minute",
            "from": from.to_rfc3339(),
            "to": (from + Duration::days(30)).to_rfc3339(),
        }))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn grouped_analytics_returns_group_mappings() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    ctx.truncate().await;

    let base = Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap();
    ctx.seed(&[
        fixtures::event(base, "users", "db.query", json!({})),
        fixtures::event(base, "users", "db.query", json!({})),
        fixtures::event(base, "billing", "db.query", json!({})),
    ])
    .await;

    let response = server
        .post("/v1/analytics")
        .json(&json!({
            "aggregation": "count",
            "group_by": ["service"],
            "order_by": "value",
            "order_desc": true,
        }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["value"], 2.0);
    assert_eq!(rows[0]["groups"]["service"], "users");
    assert_eq!(rows[1]["groups"]["service"], "billing");
}

#[tokio::test]
async fn topn_orders_by_aggregate() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    ctx.truncate().await;

    let base = Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap();
    let mut events = Vec::new();
    for _ in 0..4 {
        events.push(fixtures::event(base, "users", "db.query", json!({})));
    }
    for _ in 0..2 {
        events.push(fixtures::event(base, "billing", "db.query", json!({})));
    }
    ctx.seed(&events).await;

    // The query-string synonym surface.
    let response = server
        .get("/v1/topn?aggregation=count&group_by=service&limit=10")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(
        body["data"],
        json!([
            {"key": "users", "value": 4.0},
            {"key": "billing", "value": 2.0},
        ])
    );
}

#[tokio::test]
async fn gauge_aggregates_numeric_data() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    ctx.truncate().await;

    let base = Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap();
    let events: Vec<_> = [100, 200, 300]
        .iter()
        .map(|ms| {
            fixtures::event(
                base,
                "users",
                "db.query",
                json!({"latency_ms": ms.to_string()}),
            )
        })
        .collect();
    ctx.seed(&events).await;

    let response = server
        .post("/v1/gauge")
        .json(&json!({
            "aggregation": "avg",
            "field": "data.latency_ms",
        }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["data"]["value"], 200.0);
}

#[tokio::test]
async fn compare_derives_the_previous_window() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    ctx.truncate().await;

    let t = Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap();
    let mut events = Vec::new();
    // 5 events in the current window [T, T+1h].
    for i in 0..5 {
        events.push(fixtures::event(
            t + Duration::minutes(i + 1),
            "users",
            "db.query",
            json!({}),
        ));
    }
    // 2 events in the auto-derived previous window [T-1h, T].
    for i in 0..2 {
        events.push(fixtures::event(
            t - Duration::minutes(i + 1),
            "users",
            "db.query",
            json!({}),
        ));
    }
    ctx.seed(&events).await;

    let response = server
        .post("/v1/compare")
        .json(&json!({
            "aggregation": "count",
            "from": t.to_rfc3339(),
            "to": (t + Duration::hours(1)).to_rfc3339(),
        }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["data"]["current"], 5.0);
    assert_eq!(body["data"]["previous"], 2.0);
    assert_eq!(body["data"]["change"], 3.0);
    assert_eq!(body["data"]["change_percent"], 150.0);
}

#[tokio::test]
async fn compare_with_empty_previous_window_reports_zero_percent() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    ctx.truncate().await;

    let t = Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap();
    ctx.seed(&[fixtures::event(
        t + Duration::minutes(5),
        "users",
        "db.query",
        json!({}),
    )])
    .await;

    let response = server
        .post("/v1/compare")
        .json(&json!({
            "aggregation": "count",
            "from": t.to_rfc3339(),
            "to": (t + Duration::hours(1)).to_rfc3339(),
        }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["data"]["previous"], 0.0);
    assert_eq!(body["data"]["change_percent"], 0.0);
}
