//! Events search and autocomplete queries.

use chrono::{DateTime, Utc};
use clickhouse::Row;
use monitor_core::{Error, Event, QueryParams, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::client::StoreClient;
use crate::sql::{build_where, is_label_column, push_where, CompiledQuery, SqlValue};

/// Autocomplete result size ceiling.
const AUTOCOMPLETE_LIMIT: &str = "1000";

/// Search result page.
#[derive(Debug)]
pub struct SearchResult {
    pub events: Vec<Event>,
    pub total: u64,
}

/// Clamps a requested page size to [1, 1000], defaulting to 100.
pub fn clamp_search_limit(limit: i64) -> u64 {
    if limit <= 0 {
        100
    } else if limit > 1000 {
        1000
    } else {
        limit as u64
    }
}

#[derive(Debug, Row, Deserialize)]
struct SearchRow {
    #[serde(with = "clickhouse::serde::chrono::datetime64::micros")]
    timestamp: DateTime<Utc>,
    service: String,
    env: String,
    job_id: String,
    request_id: String,
    trace_id: String,
    name: String,
    level: String,
    data: String,
}

#[derive(Debug, Row, Deserialize)]
struct StringRow {
    value: String,
}

/// Count query: same WHERE as the search, no ordering or pagination.
pub fn compile_count(database: &str, params: &QueryParams) -> Result<CompiledQuery> {
    let (clause, args) = build_where(params, None)?;
    let mut sql = format!("SELECT count() FROM {database}.events");
    push_where(&mut sql, &clause);
    Ok(CompiledQuery { sql, args })
}

/// Search query, newest first, paginated.
pub fn compile_search(database: &str, params: &QueryParams) -> Result<CompiledQuery> {
    let (clause, mut args) = build_where(params, None)?;
    let mut sql = format!(
        "SELECT timestamp, service, env, job_id, request_id, trace_id, name, level, data \
         FROM {database}.events"
    );
    push_where(&mut sql, &clause);
    sql.push_str(" ORDER BY timestamp DESC LIMIT ? OFFSET ?");
    args.push(SqlValue::U64(clamp_search_limit(params.limit)));
    args.push(SqlValue::U64(params.offset.max(0) as u64));
    Ok(CompiledQuery { sql, args })
}

/// Distinct values of an allow-listed label, with filters on the label
/// itself excluded so the autocomplete is not self-narrowing.
pub fn compile_label_values(
    database: &str,
    label: &str,
    params: &QueryParams,
) -> Result<CompiledQuery> {
    if !is_label_column(label) {
        return Err(Error::bad_request(format!("invalid label: {label}")));
    }
    let (clause, args) = build_where(params, Some(label))?;
    let mut sql = format!("SELECT DISTINCT {label} FROM {database}.events");
    push_where(&mut sql, &clause);
    sql.push_str(&format!(" ORDER BY {label} LIMIT {AUTOCOMPLETE_LIMIT}"));
    Ok(CompiledQuery { sql, args })
}

/// Distinct keys seen inside the `data` object.
pub fn compile_data_keys(database: &str, params: &QueryParams) -> Result<CompiledQuery> {
    let (clause, args) = build_where(params, None)?;
    let mut sql = format!(
        "SELECT DISTINCT arrayJoin(JSONExtractKeys(data)) AS key FROM {database}.events"
    );
    push_where(&mut sql, &clause);
    sql.push_str(&format!(" ORDER BY key LIMIT {AUTOCOMPLETE_LIMIT}"));
    Ok(CompiledQuery { sql, args })
}

/// Distinct values of one `data` key. The key is a bound parameter and is
/// always the first argument.
pub fn compile_data_values(
    database: &str,
    key: &str,
    params: &QueryParams,
) -> Result<CompiledQuery> {
    if key.is_empty() {
        return Err(Error::bad_request("key is required"));
    }
    let (clause, mut args) = build_where(params, None)?;
    let mut sql = format!(
        "SELECT DISTINCT JSONExtractString(data, ?) AS value FROM {database}.events"
    );
    push_where(&mut sql, &clause);
    sql.push_str(&format!(
        " HAVING value != '' ORDER BY value LIMIT {AUTOCOMPLETE_LIMIT}"
    ));
    args.insert(0, SqlValue::Str(key.to_string()));
    Ok(CompiledQuery { sql, args })
}

/// Runs the paired search and count queries.
pub async fn search_events(client: &StoreClient, params: &QueryParams) -> Result<SearchResult> {
    let total: u64 = client
        .fetch_one(&compile_count(client.database(), params)?)
        .await?;

    let rows: Vec<SearchRow> = client
        .fetch_all(&compile_search(client.database(), params)?)
        .await?;

    let events = rows.into_iter().map(rehydrate).collect();
    Ok(SearchResult { events, total })
}

/// Label autocomplete; empty values are dropped from the result.
pub async fn label_values(
    client: &StoreClient,
    label: &str,
    params: &QueryParams,
) -> Result<Vec<String>> {
    let rows: Vec<StringRow> = client
        .fetch_all(&compile_label_values(client.database(), label, params)?)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| r.value)
        .filter(|v| !v.is_empty())
        .collect())
}

/// Data-key autocomplete.
pub async fn data_keys(client: &StoreClient, params: &QueryParams) -> Result<Vec<String>> {
    let rows: Vec<StringRow> = client
        .fetch_all(&compile_data_keys(client.database(), params)?)
        .await?;
    Ok(rows.into_iter().map(|r| r.value).collect())
}

/// Data-value autocomplete for one key.
pub async fn data_values(
    client: &StoreClient,
    key: &str,
    params: &QueryParams,
) -> Result<Vec<String>> {
    let rows: Vec<StringRow> = client
        .fetch_all(&compile_data_values(client.database(), key, params)?)
        .await?;
    Ok(rows.into_iter().map(|r| r.value).collect())
}

/// Turns a stored row back into an event, parsing the persisted `data`
/// text. Empty text, `{}`, and unparseable text all come back as an empty
/// object.
fn rehydrate(row: SearchRow) -> Event {
    let data = if row.data.is_empty() || row.data == "{}" {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&row.data).unwrap_or_else(|_| Value::Object(Default::default()))
    };

    Event {
        timestamp: row.timestamp,
        service: row.service,
        env: row.env,
        job_id: row.job_id,
        request_id: row.request_id,
        trace_id: row.trace_id,
        user_id: String::new(),
        name: row.name,
        level: row.level,
        data,
    }
}
