//! PostgreSQL pool and store handle.

use crate::config::StoreConfig;
use crate::partition::PartitionCatalog;
use harvest_core::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Creates a connection pool.
///
/// Connections are acquired per operation and never held across a fetch.
pub async fn create_pool(config: &StoreConfig) -> Result<PgPool> {
    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));

    if let Some(idle) = config.idle_timeout_secs {
        options = options.idle_timeout(Duration::from_secs(idle));
    }

    let pool = options
        .connect(&config.url)
        .await
        .map_err(|e| Error::config(format!("failed to connect to postgres: {}", e)))?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Created PostgreSQL pool"
    );

    Ok(pool)
}

/// Partitioned event store backed by a `PgPool`.
///
/// Cloning is cheap; clones share the pool and the partition catalog.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    catalog: Arc<PartitionCatalog>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            catalog: Arc::new(PartitionCatalog::new()),
        }
    }

    /// Connects using `config`.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        Ok(Self::new(create_pool(config).await?))
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the in-process partition catalog.
    pub fn catalog(&self) -> &PartitionCatalog {
        &self.catalog
    }
}
