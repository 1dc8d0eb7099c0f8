//! Monthly-partitioned PostgreSQL store for canonical DEX events.

pub mod client;
pub mod config;
pub mod health;
pub mod insert;
pub mod partition;
pub mod query;
pub mod schema;
pub mod store;

pub use client::*;
pub use config::*;
pub use partition::{MonthPartition, PartitionCatalog, PartitionReport};
pub use query::*;
pub use insert::UpsertReport;
pub use store::EventStore;
