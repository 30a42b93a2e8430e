//! Analytics endpoints: aggregations, time series, top-N, gauge, compare.
//!
//! Each surface accepts a JSON body (POST) or the query-string synonym
//! surface (GET).

use axum::{
    extract::{Query, State},
    response::Response,
    Json,
};
use clickhouse_client::analytics::{
    run_analytics, run_compare, run_gauge, run_timeseries, run_topn,
};
use monitor_core::{Aggregation, AnalyticsRequest, Interval, TimeInput};
use serde_json::Value;

use crate::response::{self, query_error, ApiError};
use crate::routes::query::{parse_query_params_reserving, QueryPairs};
use crate::state::AppState;

/// Keys with meaning on the analytics surfaces; everything else is a
/// filter.
const ANALYTICS_RESERVED: &[&str] = &[
    "from",
    "to",
    "limit",
    "offset",
    "key",
    "aggregation",
    "field",
    "group_by",
    "order_by",
    "order_desc",
    "interval",
    "fill_zeros",
    "compare_from",
    "compare_to",
];

fn parse_body(body: Value) -> Result<AnalyticsRequest, ApiError> {
    serde_json::from_value(body)
        .map_err(|e| ApiError::bad_request(format!("invalid request: {e}")))
}

/// Builds an [`AnalyticsRequest`] from the query-string synonym surface.
fn parse_query(pairs: &QueryPairs) -> Result<AnalyticsRequest, ApiError> {
    let get = |name: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    };

    let raw_aggregation = get("aggregation")
        .ok_or_else(|| ApiError::bad_request("aggregation is required"))?;
    let aggregation: Aggregation =
        serde_json::from_value(Value::String(raw_aggregation.to_string()))
            .map_err(|_| ApiError::bad_request(format!("invalid aggregation: {raw_aggregation}")))?;

    let interval = match get("interval") {
        None => None,
        Some(raw) => Some(
            serde_json::from_value::<Interval>(Value::String(raw.to_string()))
                .map_err(|_| ApiError::bad_request(format!("invalid interval: {raw}")))?,
        ),
    };

    let params = parse_query_params_reserving(pairs, ANALYTICS_RESERVED);
    let truthy = |name: &str| matches!(get(name), Some("true") | Some("1"));

    Ok(AnalyticsRequest {
        aggregation,
        field: get("field").map(str::to_string),
        group_by: get("group_by")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        filters: params.filters,
        from: TimeInput(params.from),
        to: TimeInput(params.to),
        order_by: get("order_by").map(str::to_string),
        order_desc: truthy("order_desc"),
        limit: (params.limit != 0).then_some(params.limit),
        interval,
        fill_zeros: truthy("fill_zeros"),
        compare_from: TimeInput(get("compare_from").and_then(monitor_core::parse_time)),
        compare_to: TimeInput(get("compare_to").and_then(monitor_core::parse_time)),
    })
}

async fn analytics(state: &AppState, request: AnalyticsRequest) -> Result<Response, ApiError> {
    let request = request.normalized();
    let rows = run_analytics(&state.store, &request)
        .await
        .map_err(query_error("failed to run analytics"))?;
    Ok(response::ok(rows))
}

async fn timeseries(state: &AppState, request: AnalyticsRequest) -> Result<Response, ApiError> {
    let request = request.normalized();
    let series = run_timeseries(&state.store, &request)
        .await
        .map_err(query_error("failed to run time series"))?;
    Ok(response::ok(series))
}

async fn topn(state: &AppState, request: AnalyticsRequest) -> Result<Response, ApiError> {
    let request = request.normalized();
    let entries = run_topn(&state.store, &request)
        .await
        .map_err(query_error("failed to run top-n"))?;
    Ok(response::ok(entries))
}

async fn gauge(state: &AppState, request: AnalyticsRequest) -> Result<Response, ApiError> {
    let request = request.normalized();
    let value = run_gauge(&state.store, &request)
        .await
        .map_err(query_error("failed to run gauge"))?;
    Ok(response::ok(value))
}

async fn compare(state: &AppState, request: AnalyticsRequest) -> Result<Response, ApiError> {
    let request = request.normalized();
    let result = run_compare(&state.store, &request)
        .await
        .map_err(query_error("failed to run comparison"))?;
    Ok(response::ok(result))
}

/// POST /v1/analytics
pub async fn analytics_post(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    analytics(&state, parse_body(body)?).await
}

/// GET /v1/analytics
pub async fn analytics_get(
    State(state): State<AppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Response, ApiError> {
    analytics(&state, parse_query(&pairs)?).await
}

/// POST /v1/timeseries
pub async fn timeseries_post(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    timeseries(&state, parse_body(body)?).await
}

/// GET /v1/timeseries
pub async fn timeseries_get(
    State(state): State<AppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Response, ApiError> {
    timeseries(&state, parse_query(&pairs)?).await
}

/// POST /v1/topn
pub async fn topn_post(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    topn(&state, parse_body(body)?).await
}

/// GET /v1/topn
pub async fn topn_get(
    State(state): State<AppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Response, ApiError> {
    topn(&state, parse_query(&pairs)?).await
}

/// POST /v1/gauge
pub async fn gauge_post(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    gauge(&state, parse_body(body)?).await
}

/// GET /v1/gauge
pub async fn gauge_get(
    State(state): State<AppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Response, ApiError> {
    gauge(&state, parse_query(&pairs)?).await
}

/// POST /v1/compare
pub async fn compare_post(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    compare(&state, parse_body(body)?).await
}

/// GET /v1/compare
pub async fn compare_get(
    State(state): State<AppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Response, ApiError> {
    compare(&state, parse_query(&pairs)?).await
}
