//! Events table schema.

use monitor_core::{Error, Result};
use tracing::debug;

use crate::client::StoreClient;

/// DDL for the events table. All columns are strings except the
/// microsecond timestamp; `data` holds the event's JSON payload as text.
pub fn create_events_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.events (
    timestamp DateTime64(6),
    service String,
    env String,
    job_id String,
    request_id String,
    trace_id String,
    user_id String,
    name String,
    level String,
    data String,

    INDEX idx_user_id user_id TYPE bloom_filter GRANULARITY 4
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY (service, timestamp)
SETTINGS index_granularity = 8192
"#
    )
}

/// Creates the events table if it does not exist. The database itself must
/// already exist (the session is bound to it, so even this DDL would fail
/// otherwise).
pub async fn init_schema(client: &StoreClient) -> Result<()> {
    let ddl = create_events_table(client.database());
    client
        .inner()
        .query(&ddl)
        .execute()
        .await
        .map_err(|e| Error::store(format!("schema init: {e}")))?;

    debug!(database = client.database(), "schema initialized");
    Ok(())
}
