//! Filter-to-SQL translation.
//!
//! Every user-supplied value is bound as a positional parameter. The only
//! user input embedded textually is a JSON key name inside
//! `JSONExtractString(data, '...')`, which is restricted to a safe
//! character set before it gets anywhere near the query text.

use monitor_core::{Error, Filter, FilterValue, Operator, QueryParams, Result};

/// Columns a filter may address directly. Anything else that is not a
/// `data.` path is skipped rather than rejected.
pub const FILTER_COLUMNS: &[&str] = &[
    "service",
    "env",
    "job_id",
    "request_id",
    "trace_id",
    "user_id",
    "name",
    "level",
];

/// Columns whose distinct values can be autocompleted.
pub const LABEL_COLUMNS: &[&str] = &["service", "env", "user_id", "name", "level"];

pub fn is_filter_column(name: &str) -> bool {
    FILTER_COLUMNS.contains(&name)
}

pub fn is_label_column(name: &str) -> bool {
    LABEL_COLUMNS.contains(&name)
}

/// A bound query argument.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Str(String),
    I64(i64),
    U64(u64),
    F64(f64),
}

/// SQL text plus its positional arguments, ready for the client to bind.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

/// JSON key names are embedded as string literals, not bound, so their
/// character set is the injection gate.
pub fn check_data_key(key: &str) -> Result<()> {
    if key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        Ok(())
    } else {
        Err(Error::bad_request(format!(
            "invalid character in data key: {key}"
        )))
    }
}

/// `JSONExtractString(data, 'key')` with the key gated first.
pub fn data_extract(key: &str) -> Result<String> {
    check_data_key(key)?;
    Ok(format!("JSONExtractString(data, '{key}')"))
}

/// Builds the WHERE conditions for `params`, joined by AND. Returns an
/// empty string when nothing applies. `exclude_column` drops column
/// filters on that field (used by label autocomplete).
pub fn build_where(
    params: &QueryParams,
    exclude_column: Option<&str>,
) -> Result<(String, Vec<SqlValue>)> {
    let mut conds: Vec<String> = Vec::new();
    let mut args: Vec<SqlValue> = Vec::new();

    for filter in &params.filters {
        if filter.is_data {
            if let Some((cond, mut a)) = data_condition(filter)? {
                conds.push(cond);
                args.append(&mut a);
            }
        } else {
            if exclude_column == Some(filter.field.as_str()) {
                continue;
            }
            if let Some((cond, mut a)) = column_condition(filter) {
                conds.push(cond);
                args.append(&mut a);
            }
        }
    }

    if let Some(from) = params.from {
        conds.push("timestamp >= ?".into());
        args.push(SqlValue::I64(from.timestamp()));
    }
    if let Some(to) = params.to {
        conds.push("timestamp <= ?".into());
        args.push(SqlValue::I64(to.timestamp()));
    }

    Ok((conds.join(" AND "), args))
}

/// Appends ` WHERE ...` to `sql` when there are any conditions.
pub fn push_where(sql: &mut String, clause: &str) {
    if !clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(clause);
    }
}

fn single_value(value: &FilterValue) -> Option<&str> {
    match value {
        FilterValue::One(v) => Some(v),
        FilterValue::Many(v) => v.first().map(String::as_str),
    }
}

fn list_values(value: &FilterValue) -> Vec<String> {
    match value {
        FilterValue::One(v) => vec![v.clone()],
        FilterValue::Many(v) => v.clone(),
    }
}

/// Translates a column filter. Fields outside the allow-list are skipped.
fn column_condition(filter: &Filter) -> Option<(String, Vec<SqlValue>)> {
    if !is_filter_column(&filter.field) {
        return None;
    }

    if filter.operator == Operator::In {
        let values = list_values(&filter.value);
        if values.is_empty() {
            return Some(("1 = 0".into(), Vec::new()));
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        return Some((
            format!("{} IN ({placeholders})", filter.field),
            values.into_iter().map(SqlValue::Str).collect(),
        ));
    }

    let value = single_value(&filter.value)?;
    Some(comparison(&filter.field, filter.operator, value))
}

/// Translates a data filter. `in` is not supported on data paths and is
/// skipped, matching the column-skip policy.
fn data_condition(filter: &Filter) -> Result<Option<(String, Vec<SqlValue>)>> {
    if filter.operator == Operator::In {
        return Ok(None);
    }
    let extract = data_extract(&filter.field)?;
    let Some(value) = single_value(&filter.value) else {
        return Ok(None);
    };

    // Ordering comparisons coerce both sides to floats; extracted JSON
    // values are text, and "1000" < "500" lexicographically.
    if let Some(op) = ordering_op(filter.operator) {
        return Ok(Some((
            format!("toFloat64OrNull({extract}) {op} toFloat64OrNull(?)"),
            vec![SqlValue::Str(value.to_string())],
        )));
    }

    Ok(Some(comparison(&extract, filter.operator, value)))
}

fn ordering_op(operator: Operator) -> Option<&'static str> {
    match operator {
        Operator::Lt => Some("<"),
        Operator::Gt => Some(">"),
        Operator::Lte => Some("<="),
        Operator::Gte => Some(">="),
        _ => None,
    }
}

fn comparison(lhs: &str, operator: Operator, value: &str) -> (String, Vec<SqlValue>) {
    let (cond, bound) = match operator {
        Operator::Eq => (format!("{lhs} = ?"), value.to_string()),
        Operator::Neq => (format!("{lhs} != ?"), value.to_string()),
        Operator::Lt => (format!("{lhs} < ?"), value.to_string()),
        Operator::Gt => (format!("{lhs} > ?"), value.to_string()),
        Operator::Lte => (format!("{lhs} <= ?"), value.to_string()),
        Operator::Gte => (format!("{lhs} >= ?"), value.to_string()),
        Operator::Contains => (format!("{lhs} LIKE ?"), format!("%{value}%")),
        Operator::StartsWith => (format!("{lhs} LIKE ?"), format!("{value}%")),
        Operator::EndsWith => (format!("{lhs} LIKE ?"), format!("%{value}")),
        // Handled by the callers.
        Operator::In => unreachable!("in is expanded before comparison"),
    };
    (cond, vec![SqlValue::Str(bound)])
}
