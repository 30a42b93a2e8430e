//! Analytics aggregation queries: grouped aggregations, time series,
//! top-N, gauge, and period-over-period comparison.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, Months, Timelike, Utc};
use clickhouse::Row;
use monitor_core::{
    Aggregation, AnalyticsRequest, Error, Interval, QueryParams, Result,
};
use serde::{Deserialize, Serialize};

use crate::client::StoreClient;
use crate::sql::{build_where, data_extract, is_filter_column, push_where, CompiledQuery, SqlValue};

const DEFAULT_LIMIT: i64 = 100;
const ANALYTICS_MAX_LIMIT: i64 = 10_000;
const TOPN_MAX_LIMIT: i64 = 1_000;
const MAX_GROUP_BY: usize = 10;
const MAX_RANGE_DAYS: i64 = 90;
const MAX_BUCKETS: i64 = 10_000;

/// One aggregation result row.
#[derive(Debug, Serialize)]
pub struct AnalyticsRow {
    pub value: f64,
    pub groups: BTreeMap<String, String>,
}

/// One time-series point.
#[derive(Debug, Clone, Serialize)]
pub struct Point {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A named series; the name is the group values joined by `|`, empty for
/// an ungrouped query.
#[derive(Debug, Serialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<Point>,
}

/// Top-N result entry.
#[derive(Debug, Serialize)]
pub struct TopNEntry {
    pub key: String,
    pub value: f64,
}

/// Single-value result.
#[derive(Debug, Serialize)]
pub struct GaugeResult {
    pub value: f64,
}

/// Period-over-period comparison.
#[derive(Debug, Serialize)]
pub struct CompareResult {
    pub current: f64,
    pub previous: f64,
    pub change: f64,
    pub change_percent: f64,
}

#[derive(Debug, Row, Deserialize)]
struct ValueRow {
    value: f64,
}

#[derive(Debug, Row, Deserialize)]
struct GroupedRow {
    value: f64,
    groups: Vec<String>,
}

#[derive(Debug, Row, Deserialize)]
struct BucketRow {
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    bucket: DateTime<Utc>,
    value: f64,
}

#[derive(Debug, Row, Deserialize)]
struct GroupedBucketRow {
    #[serde(with = "clickhouse::serde::chrono::datetime")]
    bucket: DateTime<Utc>,
    value: f64,
    groups: Vec<String>,
}

#[derive(Debug, Row, Deserialize)]
struct KeyValueRow {
    key: String,
    value: f64,
}

/// Resolves an aggregation field to a SQL expression. `data.X` goes
/// through JSON extraction; numeric aggregations coerce with
/// `toFloat64OrNull` so non-numeric values drop out of the aggregate.
fn field_expr(field: &str, numeric: bool) -> Result<String> {
    let expr = if let Some(key) = field.strip_prefix("data.") {
        data_extract(key)?
    } else if is_filter_column(field) {
        field.to_string()
    } else {
        return Err(Error::bad_request(format!("invalid field: {field}")));
    };

    if numeric {
        Ok(format!("toFloat64OrNull({expr})"))
    } else {
        Ok(expr)
    }
}

fn group_expr(field: &str) -> Result<String> {
    field_expr(field, false)
}

/// The aggregate projection, always a non-null Float64 so result rows
/// decode into a fixed shape.
fn agg_expr(request: &AnalyticsRequest) -> Result<String> {
    let agg = request.aggregation;
    if agg == Aggregation::Count {
        return Ok("toFloat64(count())".into());
    }

    let field = request
        .field
        .as_deref()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| Error::bad_request("field is required for this aggregation"))?;
    let expr = field_expr(field, agg.is_numeric())?;

    let inner = match agg {
        Aggregation::Count => unreachable!("count handled above"),
        Aggregation::CountUnique => format!("uniqExact({expr})"),
        Aggregation::Sum => format!("sum({expr})"),
        Aggregation::Avg => format!("avg({expr})"),
        Aggregation::Min => format!("min({expr})"),
        Aggregation::Max => format!("max({expr})"),
        Aggregation::P50 => format!("quantile(0.5)({expr})"),
        Aggregation::P90 => format!("quantile(0.9)({expr})"),
        Aggregation::P95 => format!("quantile(0.95)({expr})"),
        Aggregation::P99 => format!("quantile(0.99)({expr})"),
    };
    Ok(format!("toFloat64(ifNull({inner}, 0))"))
}

fn clamp_limit(limit: Option<i64>, max: i64) -> u64 {
    let l = limit.unwrap_or(DEFAULT_LIMIT);
    if l <= 0 {
        DEFAULT_LIMIT as u64
    } else {
        l.min(max) as u64
    }
}

fn query_params(request: &AnalyticsRequest) -> QueryParams {
    QueryParams {
        filters: request.filters.clone(),
        from: request.from.0,
        to: request.to.0,
        limit: 0,
        offset: 0,
    }
}

fn group_exprs(request: &AnalyticsRequest) -> Result<Vec<String>> {
    if request.group_by.len() > MAX_GROUP_BY {
        return Err(Error::bad_request(format!(
            "too many group_by fields (max {MAX_GROUP_BY})"
        )));
    }
    request.group_by.iter().map(|g| group_expr(g)).collect()
}

/// ORDER BY for grouped aggregations: `value`, or one of the grouped
/// fields. Anything else is ignored, like unknown filter columns.
fn order_clause(request: &AnalyticsRequest, groups: &[String]) -> Option<String> {
    let target = request.order_by.as_deref()?;
    let expr = if target == "value" {
        "value".to_string()
    } else {
        let idx = request.group_by.iter().position(|g| g == target)?;
        groups[idx].clone()
    };
    let dir = if request.order_desc { "DESC" } else { "ASC" };
    Some(format!(" ORDER BY {expr} {dir}"))
}

/// Compiled aggregation plus whether it carries a `groups` column.
#[derive(Debug)]
pub struct CompiledAnalytics {
    pub query: CompiledQuery,
    pub grouped: bool,
}

/// Aggregation query, optionally grouped. Group values are projected as
/// one `Array(String)` column so the row shape is fixed.
pub fn compile_analytics(database: &str, request: &AnalyticsRequest) -> Result<CompiledAnalytics> {
    let agg = agg_expr(request)?;
    let groups = group_exprs(request)?;
    let (clause, mut args) = build_where(&query_params(request), None)?;

    let mut sql = format!("SELECT {agg} AS value");
    if !groups.is_empty() {
        sql.push_str(&format!(", array({}) AS groups", groups.join(", ")));
    }
    sql.push_str(&format!(" FROM {database}.events"));
    push_where(&mut sql, &clause);
    if !groups.is_empty() {
        sql.push_str(&format!(" GROUP BY {}", groups.join(", ")));
        if let Some(order) = order_clause(request, &groups) {
            sql.push_str(&order);
        }
    }
    sql.push_str(" LIMIT ?");
    args.push(SqlValue::U64(clamp_limit(request.limit, ANALYTICS_MAX_LIMIT)));

    Ok(CompiledAnalytics {
        query: CompiledQuery { sql, args },
        grouped: !request.group_by.is_empty(),
    })
}

/// Time-series query. The range and bucket-count ceilings are enforced
/// here, before any SQL is issued.
pub fn compile_timeseries(database: &str, request: &AnalyticsRequest) -> Result<CompiledQuery> {
    let interval = request
        .interval
        .ok_or_else(|| Error::bad_request("interval is required"))?;
    let (from, to) = require_window(request)?;

    let range = to - from;
    if range > Duration::days(MAX_RANGE_DAYS) {
        return Err(Error::bad_request(format!(
            "time range exceeds {MAX_RANGE_DAYS} days"
        )));
    }
    let buckets = range.num_seconds() / interval.approx_secs() + 1;
    if buckets > MAX_BUCKETS {
        return Err(Error::bad_request(format!(
            "too many buckets (max {MAX_BUCKETS})"
        )));
    }

    let agg = agg_expr(request)?;
    let groups = group_exprs(request)?;
    let (clause, args) = build_where(&query_params(request), None)?;

    let bucket = format!(
        "toDateTime(toStartOfInterval(timestamp, INTERVAL 1 {}))",
        interval.unit()
    );
    let mut sql = format!("SELECT {bucket} AS bucket, {agg} AS value");
    if !groups.is_empty() {
        sql.push_str(&format!(", array({}) AS groups", groups.join(", ")));
    }
    sql.push_str(&format!(" FROM {database}.events"));
    push_where(&mut sql, &clause);
    sql.push_str(" GROUP BY bucket");
    for g in &groups {
        sql.push_str(&format!(", {g}"));
    }
    sql.push_str(" ORDER BY bucket");

    Ok(CompiledQuery { sql, args })
}

/// Top-N query over exactly one group field, highest aggregate first.
pub fn compile_topn(database: &str, request: &AnalyticsRequest) -> Result<CompiledQuery> {
    if request.group_by.len() != 1 {
        return Err(Error::bad_request(
            "top-n requires exactly one group_by field",
        ));
    }
    let key = group_expr(&request.group_by[0])?;
    let agg = agg_expr(request)?;
    let (clause, mut args) = build_where(&query_params(request), None)?;

    let mut sql = format!("SELECT {key} AS key, {agg} AS value FROM {database}.events");
    push_where(&mut sql, &clause);
    sql.push_str(" GROUP BY key ORDER BY value DESC LIMIT ?");
    args.push(SqlValue::U64(clamp_limit(request.limit, TOPN_MAX_LIMIT)));

    Ok(CompiledQuery { sql, args })
}

/// Runs an aggregation, zipping group values back to their field names.
pub async fn run_analytics(
    client: &StoreClient,
    request: &AnalyticsRequest,
) -> Result<Vec<AnalyticsRow>> {
    let compiled = compile_analytics(client.database(), request)?;

    if compiled.grouped {
        let rows: Vec<GroupedRow> = client.fetch_all(&compiled.query).await?;
        Ok(rows
            .into_iter()
            .map(|r| AnalyticsRow {
                value: r.value,
                groups: request
                    .group_by
                    .iter()
                    .cloned()
                    .zip(r.groups)
                    .collect(),
            })
            .collect())
    } else {
        let rows: Vec<ValueRow> = client.fetch_all(&compiled.query).await?;
        Ok(rows
            .into_iter()
            .map(|r| AnalyticsRow {
                value: r.value,
                groups: BTreeMap::new(),
            })
            .collect())
    }
}

/// Runs a time-series query and shapes the rows into series. With
/// `fill_zeros` and at most one series, absent buckets inside the window
/// are synthesized with zero values.
pub async fn run_timeseries(
    client: &StoreClient,
    request: &AnalyticsRequest,
) -> Result<Vec<Series>> {
    let compiled = compile_timeseries(client.database(), request)?;
    let grouped = !request.group_by.is_empty();

    let mut series: Vec<Series> = Vec::new();
    let mut push_point = |name: String, point: Point| {
        match series.iter_mut().find(|s| s.name == name) {
            Some(s) => s.points.push(point),
            None => series.push(Series {
                name,
                points: vec![point],
            }),
        }
    };

    if grouped {
        let rows: Vec<GroupedBucketRow> = client.fetch_all(&compiled).await?;
        for row in rows {
            push_point(
                row.groups.join("|"),
                Point {
                    timestamp: row.bucket,
                    value: row.value,
                },
            );
        }
    } else {
        let rows: Vec<BucketRow> = client.fetch_all(&compiled).await?;
        for row in rows {
            push_point(
                String::new(),
                Point {
                    timestamp: row.bucket,
                    value: row.value,
                },
            );
        }
    }

    if request.fill_zeros && series.len() <= 1 {
        // compile_timeseries already proved these are present.
        let (from, to) = require_window(request)?;
        let interval = request
            .interval
            .ok_or_else(|| Error::bad_request("interval is required"))?;
        let existing = series.pop();
        series = vec![zero_fill(existing, from, to, interval)];
    }

    Ok(series)
}

/// Runs a top-N query.
pub async fn run_topn(client: &StoreClient, request: &AnalyticsRequest) -> Result<Vec<TopNEntry>> {
    let compiled = compile_topn(client.database(), request)?;
    let rows: Vec<KeyValueRow> = client.fetch_all(&compiled).await?;
    Ok(rows
        .into_iter()
        .map(|r| TopNEntry {
            key: r.key,
            value: r.value,
        })
        .collect())
}

/// Runs an ungrouped single-value aggregation.
pub async fn run_gauge(client: &StoreClient, request: &AnalyticsRequest) -> Result<GaugeResult> {
    let mut request = request.clone();
    request.group_by.clear();
    request.limit = Some(1);

    let compiled = compile_analytics(client.database(), &request)?;
    let row: ValueRow = client.fetch_one(&compiled.query).await?;
    Ok(GaugeResult { value: row.value })
}

/// Runs the aggregation over the primary and comparison windows.
pub async fn run_compare(
    client: &StoreClient,
    request: &AnalyticsRequest,
) -> Result<CompareResult> {
    let ((from, to), (prev_from, prev_to)) = compare_windows(request)?;

    let mut current_req = request.clone();
    current_req.from = monitor_core::TimeInput(Some(from));
    current_req.to = monitor_core::TimeInput(Some(to));
    let current = run_gauge(client, &current_req).await?.value;

    let mut previous_req = request.clone();
    previous_req.from = monitor_core::TimeInput(Some(prev_from));
    previous_req.to = monitor_core::TimeInput(Some(prev_to));
    let previous = run_gauge(client, &previous_req).await?.value;

    let (change, change_percent) = change_stats(current, previous);
    Ok(CompareResult {
        current,
        previous,
        change,
        change_percent,
    })
}

fn require_window(request: &AnalyticsRequest) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let from = request
        .from
        .0
        .ok_or_else(|| Error::bad_request("from and to are required"))?;
    let to = request
        .to
        .0
        .ok_or_else(|| Error::bad_request("from and to are required"))?;
    if to < from {
        return Err(Error::bad_request("to must not precede from"));
    }
    Ok((from, to))
}

/// Primary and comparison windows. An absent comparison window derives a
/// window of the same duration immediately preceding `from`.
pub fn compare_windows(
    request: &AnalyticsRequest,
) -> Result<((DateTime<Utc>, DateTime<Utc>), (DateTime<Utc>, DateTime<Utc>))> {
    let (from, to) = require_window(request)?;

    let previous = match (request.compare_from.0, request.compare_to.0) {
        (Some(pf), Some(pt)) => (pf, pt),
        _ => (from - (to - from), from),
    };
    Ok(((from, to), previous))
}

/// Absolute and percentage change; the percentage is exactly zero when
/// there is no previous value to compare against.
pub fn change_stats(current: f64, previous: f64) -> (f64, f64) {
    let change = current - previous;
    let change_percent = if previous == 0.0 {
        0.0
    } else {
        100.0 * change / previous
    };
    (change, change_percent)
}

/// Synthesizes zero-valued points for buckets absent from `existing`
/// across `[from, to]`, in timestamp order.
fn zero_fill(
    existing: Option<Series>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    interval: Interval,
) -> Series {
    let (name, points) = match existing {
        Some(s) => (s.name, s.points),
        None => (String::new(), Vec::new()),
    };
    let by_bucket: HashMap<i64, f64> = points
        .into_iter()
        .map(|p| (p.timestamp.timestamp(), p.value))
        .collect();

    let mut filled = Vec::new();
    let mut t = align_bucket(from, interval);
    while t <= to {
        filled.push(Point {
            timestamp: t,
            value: by_bucket.get(&t.timestamp()).copied().unwrap_or(0.0),
        });
        t = step_bucket(t, interval);
    }

    Series {
        name,
        points: filled,
    }
}

/// Truncates a timestamp to its bucket start, matching the store's
/// `toStartOfInterval` alignment (weeks start Monday).
fn align_bucket(t: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    let midnight = |d: DateTime<Utc>| {
        d.with_hour(0)
            .and_then(|d| d.with_minute(0))
            .and_then(|d| d.with_second(0))
            .and_then(|d| d.with_nanosecond(0))
            .unwrap_or(d)
    };

    match interval {
        Interval::Minute => t
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(t),
        Interval::Hour => t
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(t),
        Interval::Day => midnight(t),
        Interval::Week => {
            let days = i64::from(t.weekday().num_days_from_monday());
            midnight(t - Duration::days(days))
        }
        Interval::Month => midnight(t.with_day(1).unwrap_or(t)),
    }
}

/// Advances one bucket; months step by calendar month.
fn step_bucket(t: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    match interval {
        Interval::Minute => t + Duration::minutes(1),
        Interval::Hour => t + Duration::hours(1),
        Interval::Day => t + Duration::days(1),
        Interval::Week => t + Duration::weeks(1),
        Interval::Month => t
            .checked_add_months(Months::new(1))
            .unwrap_or(t + Duration::days(30)),
    }
}
