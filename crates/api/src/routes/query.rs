//! Search and autocomplete endpoints.

use axum::{
    extract::{Path, Query, State},
    http::Uri,
    response::Response,
};
use clickhouse_client::search::{
    clamp_search_limit, data_keys, data_values, label_values, search_events,
};
use monitor_core::{parse_time, Filter, FilterValue, Operator, QueryParams};

use crate::response::{self, query_error, ApiError};
use crate::state::AppState;

/// Query parameters that are never filters.
const RESERVED_PARAMS: &[&str] = &["from", "to", "limit", "offset", "key"];

/// Raw query-string pairs; axum decodes them for us.
pub type QueryPairs = Vec<(String, String)>;

/// Parses `[data.]<field>[__<op>]`. An unknown suffix keeps the whole key
/// as the field name with an implied `eq`.
pub fn parse_filter_key(key: &str) -> (String, Operator, bool) {
    let (key, is_data) = match key.strip_prefix("data.") {
        Some(rest) => (rest, true),
        None => (key, false),
    };

    let parts: Vec<&str> = key.split("__").collect();
    if parts.len() == 1 {
        return (parts[0].to_string(), Operator::Eq, is_data);
    }

    match Operator::from_suffix(parts[parts.len() - 1]) {
        Some(op) => (parts[0].to_string(), op, is_data),
        None => (key.to_string(), Operator::Eq, is_data),
    }
}

/// Builds [`QueryParams`] from decoded query-string pairs.
pub fn parse_query_params(pairs: &QueryPairs) -> QueryParams {
    parse_query_params_reserving(pairs, RESERVED_PARAMS)
}

/// Same, with an endpoint-specific reserved-key set.
pub fn parse_query_params_reserving(pairs: &QueryPairs, reserved: &[&str]) -> QueryParams {
    let mut params = QueryParams::default();

    for (key, value) in pairs {
        match key.as_str() {
            "from" => params.from = parse_time(value),
            "to" => params.to = parse_time(value),
            "limit" => {
                if let Ok(limit) = value.parse() {
                    params.limit = limit;
                }
            }
            "offset" => {
                if let Ok(offset) = value.parse() {
                    params.offset = offset;
                }
            }
            _ if reserved.contains(&key.as_str()) => {}
            _ => {
                let (field, operator, is_data) = parse_filter_key(key);
                let value = if operator == Operator::In {
                    FilterValue::Many(value.split(',').map(str::to_string).collect())
                } else {
                    FilterValue::One(value.clone())
                };
                params.filters.push(Filter {
                    field,
                    operator,
                    value,
                    is_data,
                });
            }
        }
    }

    params
}

/// Pagination links, preserving every query parameter except
/// `offset`/`limit`, which are overwritten.
pub fn pagination_links(
    path: &str,
    pairs: &QueryPairs,
    params: &QueryParams,
    total: u64,
) -> (Option<String>, Option<String>) {
    let limit = clamp_search_limit(params.limit) as i64;
    let offset = params.offset.max(0);

    let next = if offset + limit < total as i64 {
        Some(page_url(path, pairs, offset + limit, limit))
    } else {
        None
    };

    let previous = if offset > 0 {
        Some(page_url(path, pairs, (offset - limit).max(0), limit))
    } else {
        None
    };

    (next, previous)
}

fn page_url(path: &str, pairs: &QueryPairs, offset: i64, limit: i64) -> String {
    let mut query: QueryPairs = pairs
        .iter()
        .filter(|(k, _)| k != "offset" && k != "limit")
        .cloned()
        .collect();
    query.push(("limit".into(), limit.to_string()));
    query.push(("offset".into(), offset.to_string()));

    match serde_urlencoded::to_string(&query) {
        Ok(encoded) => format!("{path}?{encoded}"),
        Err(_) => path.to_string(),
    }
}

/// GET /v1/events
pub async fn search_handler(
    State(state): State<AppState>,
    uri: Uri,
    Query(pairs): Query<QueryPairs>,
) -> Result<Response, ApiError> {
    let params = parse_query_params(&pairs);
    let result = search_events(&state.store, &params)
        .await
        .map_err(query_error("failed to query events"))?;

    let (next, previous) = pagination_links(uri.path(), &pairs, &params, result.total);
    Ok(response::ok_with_count(
        result.events,
        result.total,
        next,
        previous,
    ))
}

/// GET /v1/labels/:label/values
pub async fn label_values_handler(
    State(state): State<AppState>,
    Path(label): Path<String>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Response, ApiError> {
    let params = parse_query_params(&pairs);
    let values = label_values(&state.store, &label, &params)
        .await
        .map_err(query_error("failed to get label values"))?;
    Ok(response::ok(values))
}

/// GET /v1/data/keys
pub async fn data_keys_handler(
    State(state): State<AppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Response, ApiError> {
    let params = parse_query_params(&pairs);
    let keys = data_keys(&state.store, &params)
        .await
        .map_err(query_error("failed to get data keys"))?;
    Ok(response::ok(keys))
}

/// GET /v1/data/values?key=...
pub async fn data_values_handler(
    State(state): State<AppState>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Response, ApiError> {
    let key = pairs
        .iter()
        .find(|(k, _)| k == "key")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    if key.is_empty() {
        return Err(ApiError::bad_request("key parameter is required"));
    }

    let params = parse_query_params(&pairs);
    let values = data_values(&state.store, &key, &params)
        .await
        .map_err(query_error("failed to get data values"))?;
    Ok(response::ok(values))
}
