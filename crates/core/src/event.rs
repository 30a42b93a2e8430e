//! Canonical event record and validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Why an event failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingRequired(&'static str),
    #[error("{0} must be a valid uuid")]
    BadUuid(&'static str),
    #[error("data must be a json object")]
    BadDataShape,
}

/// A single monitoring event.
///
/// All string fields default to empty and `data` to JSON null so that a
/// sparse NDJSON line deserializes cleanly; [`Event::validate`] decides
/// whether the result is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Producer-supplied timestamp. The epoch default marks "absent".
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: String,
    /// Open-ended payload; must be an object (or null) to pass validation.
    #[serde(default)]
    pub data: Value,
}

impl Event {
    /// Checks required fields, UUID syntax of the `*_id` fields, and the
    /// shape of `data`. An event that fails here is rejected atomically.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timestamp == DateTime::<Utc>::default() {
            return Err(ValidationError::MissingRequired("timestamp"));
        }
        if self.service.is_empty() {
            return Err(ValidationError::MissingRequired("service"));
        }
        if self.name.is_empty() {
            return Err(ValidationError::MissingRequired("name"));
        }

        let ids = [
            ("job_id", &self.job_id),
            ("request_id", &self.request_id),
            ("trace_id", &self.trace_id),
            ("user_id", &self.user_id),
        ];
        for (field, value) in ids {
            if !value.is_empty() && !is_uuid(value) {
                return Err(ValidationError::BadUuid(field));
            }
        }

        match &self.data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(ValidationError::BadDataShape),
        }
    }

    /// JSON text of `data` for persistence. Null, non-object, or
    /// unserializable data all collapse to `"{}"` — an event is never lost
    /// to an encoding problem.
    pub fn data_json(&self) -> String {
        match &self.data {
            Value::Object(_) => serde_json::to_string(&self.data).unwrap_or_else(|_| "{}".into()),
            _ => "{}".into(),
        }
    }
}

/// Hyphenated 8-4-4-4-12 hex, case-insensitive. `uuid` accepts several
/// syntaxes; the length check pins it to the canonical one.
fn is_uuid(s: &str) -> bool {
    s.len() == 36 && Uuid::try_parse(s).is_ok()
}
