//! Store seam used by the pipeline engine.

use crate::client::PgStore;
use crate::insert::{batch_upsert, UpsertReport};
use crate::partition::{ensure_partitions, PartitionReport};
use async_trait::async_trait;
use harvest_core::{EventBatch, Result, TimeWindow};

/// Partitioned event storage.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Create every monthly partition covering `window`, for every kind.
    async fn ensure_partitions(&self, window: &TimeWindow) -> Result<PartitionReport>;

    /// Insert `batch`, skipping rows that already exist.
    async fn batch_upsert(&self, batch: &EventBatch) -> Result<UpsertReport>;

    /// Whether the store is reachable.
    async fn check_connection(&self) -> bool;
}

#[async_trait]
impl EventStore for PgStore {
    async fn ensure_partitions(&self, window: &TimeWindow) -> Result<PartitionReport> {
        ensure_partitions(self.pool(), self.catalog(), window).await
    }

    async fn batch_upsert(&self, batch: &EventBatch) -> Result<UpsertReport> {
        batch_upsert(self.pool(), batch).await
    }

    async fn check_connection(&self) -> bool {
        crate::health::check_connection(self.pool()).await
    }
}
