//! Batch insert into the events table.

use chrono::{DateTime, Utc};
use clickhouse::Row;
use monitor_core::{Error, Event, Result};
use serde::Serialize;
use tracing::debug;

use crate::client::StoreClient;

/// Flattened event row. Field order matches the table's column order:
/// `(timestamp, service, env, job_id, request_id, trace_id, user_id, name,
/// level, data)`.
#[derive(Debug, Clone, Row, Serialize)]
pub struct EventRow {
    #[serde(with = "clickhouse::serde::chrono::datetime64::micros")]
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub env: String,
    pub job_id: String,
    pub request_id: String,
    pub trace_id: String,
    pub user_id: String,
    pub name: String,
    pub level: String,
    pub data: String,
}

impl From<&Event> for EventRow {
    fn from(event: &Event) -> Self {
        Self {
            timestamp: event.timestamp,
            service: event.service.clone(),
            env: event.env.clone(),
            job_id: event.job_id.clone(),
            request_id: event.request_id.clone(),
            trace_id: event.trace_id.clone(),
            user_id: event.user_id.clone(),
            name: event.name.clone(),
            level: event.level.clone(),
            data: event.data_json(),
        }
    }
}

/// Inserts a batch of validated events. The whole batch lands or fails as
/// one statement.
pub async fn insert_events(client: &StoreClient, events: &[Event]) -> Result<usize> {
    if events.is_empty() {
        return Ok(0);
    }

    let table = client.events_table();
    let mut insert = client
        .inner()
        .insert(&table)
        .map_err(|e| Error::store(format!("prepare insert: {e}")))?;

    for event in events {
        let row = EventRow::from(event);
        insert
            .write(&row)
            .await
            .map_err(|e| Error::store(format!("write row: {e}")))?;
    }

    insert
        .end()
        .await
        .map_err(|e| Error::store(format!("send batch: {e}")))?;

    debug!(count = events.len(), "inserted events");
    Ok(events.len())
}
