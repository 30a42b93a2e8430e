//! Structured query model shared by the HTTP layer and the SQL compiler.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Filter comparison operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    #[default]
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
    In,
}

impl Operator {
    /// Parses an operator suffix from the filter-key grammar.
    pub fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "neq" => Some(Self::Neq),
            "lt" => Some(Self::Lt),
            "gt" => Some(Self::Gt),
            "lte" => Some(Self::Lte),
            "gte" => Some(Self::Gte),
            "contains" => Some(Self::Contains),
            "startswith" => Some(Self::StartsWith),
            "endswith" => Some(Self::EndsWith),
            "in" => Some(Self::In),
            _ => None,
        }
    }
}

/// A filter value: a single string, or a comma-split list for `in`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

/// A single filter. `is_data` selects between a first-class column and a
/// key inside the JSON `data` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    #[serde(default)]
    pub operator: Operator,
    pub value: FilterValue,
    #[serde(default)]
    pub is_data: bool,
}

impl Filter {
    pub fn column(field: impl Into<String>, operator: Operator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            is_data: false,
        }
    }

    pub fn data(field: impl Into<String>, operator: Operator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            is_data: true,
        }
    }

    /// Folds a `data.`-prefixed field name into the `is_data` flag, so JSON
    /// bodies may spell data filters either way.
    pub fn normalized(mut self) -> Self {
        if !self.is_data {
            if let Some(rest) = self.field.strip_prefix("data.") {
                self.field = rest.to_string();
                self.is_data = true;
            }
        }
        self
    }
}

/// Parameters of a search-style query.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub filters: Vec<Filter>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

/// Aggregation functions exposed by the analytics surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Count,
    CountUnique,
    Sum,
    Avg,
    Min,
    Max,
    P50,
    P90,
    P95,
    P99,
}

impl Aggregation {
    /// Every aggregation except `count` needs a field to aggregate over.
    pub fn requires_field(&self) -> bool {
        !matches!(self, Self::Count)
    }

    /// Whether the field is coerced to a float before aggregating.
    /// `count_unique` is the only field-taking aggregation that works on
    /// the raw string value.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Count | Self::CountUnique)
    }
}

/// Time-series bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl Interval {
    /// SQL interval unit keyword.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Approximate width in seconds, used only for the bucket-count ceiling.
    pub fn approx_secs(&self) -> i64 {
        match self {
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
            Self::Week => 604_800,
            Self::Month => 2_592_000,
        }
    }
}

/// A time field accepting RFC 3339 or Unix seconds, in either string or
/// integer form. Anything unparseable is treated as unset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeInput(pub Option<DateTime<Utc>>);

impl<'de> Deserialize<'de> for TimeInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(TimeInput(match raw {
            Some(serde_json::Value::String(s)) => parse_time(&s),
            Some(serde_json::Value::Number(n)) => {
                n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            }
            _ => None,
        }))
    }
}

/// Parses RFC 3339, falling back to signed Unix seconds. Returns `None`
/// when neither form applies.
pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    s.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// Request body for the analytics surfaces. The query-string synonym
/// surface is parsed into this same struct by the HTTP layer.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsRequest {
    pub aggregation: Aggregation,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub from: TimeInput,
    #[serde(default)]
    pub to: TimeInput,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub order_desc: bool,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub interval: Option<Interval>,
    #[serde(default)]
    pub fill_zeros: bool,
    #[serde(default)]
    pub compare_from: TimeInput,
    #[serde(default)]
    pub compare_to: TimeInput,
}

impl AnalyticsRequest {
    /// Applies [`Filter::normalized`] to every filter.
    pub fn normalized(mut self) -> Self {
        self.filters = self.filters.into_iter().map(Filter::normalized).collect();
        self
    }
}
