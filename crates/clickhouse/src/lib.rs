//! ClickHouse client and query compiler for the monitor pipeline.

pub mod analytics;
pub mod client;
pub mod config;
pub mod insert;
pub mod schema;
pub mod search;
pub mod sql;

pub use client::StoreClient;
pub use config::StoreConfig;
pub use insert::insert_events;
pub use schema::init_schema;
