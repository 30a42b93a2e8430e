//! Common test setup.

use std::sync::Arc;
use std::time::Duration;

use api::{router, AppState};
use axum::Router;
use clickhouse_client::{init_schema, insert_events, StoreClient, StoreConfig};
use monitor_core::Event;
use pipeline::{Batcher, BatcherConfig, EventQueue};

use crate::containers::TestContainers;

/// Test context wiring the real router, queue, and batcher against a
/// ClickHouse testcontainer. The batcher flushes every 100 ms so tests
/// observe rows quickly.
pub struct TestContext {
    pub containers: TestContainers,
    pub store: Arc<StoreClient>,
    pub queue: Arc<EventQueue>,
    pub router: Router,
    _batcher: tokio::task::JoinHandle<()>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_api_key("").await
    }

    pub async fn with_api_key(api_key: &str) -> Self {
        let containers = TestContainers::start().await;

        let store_config = StoreConfig {
            addr: containers.clickhouse_url.clone(),
            database: containers.clickhouse_database.clone(),
            username: containers.clickhouse_username.clone(),
            password: containers.clickhouse_password.clone(),
            ..Default::default()
        };
        let store = Arc::new(
            StoreClient::connect(&store_config)
                .await
                .expect("Failed to connect to ClickHouse"),
        );

        init_schema(&store).await.expect("Failed to initialize schema");

        let (queue, receiver) = EventQueue::new(10_000);
        let queue = Arc::new(queue);

        let batcher = Batcher::new(
            store.clone(),
            BatcherConfig {
                batch_size: 1000,
                flush_interval: Duration::from_millis(100),
                flush_timeout: Duration::from_secs(10),
            },
        )
        .spawn(receiver);

        let state = AppState::new(queue.clone(), store.clone(), api_key);
        let router = router(state);

        Self {
            containers,
            store,
            queue,
            router,
            _batcher: batcher,
        }
    }

    /// Remove all rows (use between tests sharing a server).
    pub async fn truncate(&self) {
        let sql = format!(
            "TRUNCATE TABLE IF EXISTS {}.events",
            self.store.database()
        );
        self.store.inner().query(&sql).execute().await.ok();
    }

    /// Current row count in the events table.
    pub async fn count_events(&self) -> u64 {
        let sql = format!("SELECT count() FROM {}.events", self.store.database());
        self.store
            .inner()
            .query(&sql)
            .fetch_one::<u64>()
            .await
            .expect("count query failed")
    }

    /// Polls until the events table holds at least `expected` rows or a
    /// few seconds pass; returns the final count.
    pub async fn wait_for_rows(&self, expected: u64) -> u64 {
        for _ in 0..50 {
            let count = self.count_events().await;
            if count >= expected {
                return count;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        self.count_events().await
    }

    /// Insert events directly, bypassing the HTTP path.
    pub async fn seed(&self, events: &[Event]) {
        insert_events(&self.store, events)
            .await
            .expect("seed insert failed");
    }
}
