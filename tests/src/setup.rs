//! Common test setup functions.

use api::{router, state::AppState};
use axum::Router;
use harvest_core::{EventKind, Source};
use partition_store::{EventStore, PgStore};
use sources::UniswapV3Normalizer;
use std::sync::Arc;
use worker::{PipelineConfig, PipelineEngine, RunStatusRegistry};

use crate::containers::TestContainers;
use crate::mocks::{MockAdapter, MockStore};

/// Pipeline settings with no waiting between pages or attempts.
pub fn fast_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        max_attempts: 3,
        retry_delay_ms: 0,
        page_delay_ms: 0,
    }
}

/// A V3 source backed by `adapter`.
pub fn mock_source(id: &str, adapter: MockAdapter, page_size: usize) -> Source {
    Source::new(
        id,
        Arc::new(adapter),
        Arc::new(UniswapV3Normalizer),
        page_size,
    )
}

/// A pipeline engine writing into `store`.
pub fn mock_engine(store: &MockStore) -> PipelineEngine {
    telemetry::init_test_tracing();
    PipelineEngine::new(
        Arc::new(store.clone()) as Arc<dyn EventStore>,
        fast_pipeline_config(),
    )
}

/// Router over an in-memory store.
pub struct ApiContext {
    pub store: MockStore,
    pub status: Arc<RunStatusRegistry>,
    pub router: Router,
}

impl ApiContext {
    pub fn new() -> Self {
        telemetry::init_test_tracing();
        let store = MockStore::new();
        let status = Arc::new(RunStatusRegistry::new());
        let state = AppState::new(
            Arc::new(store.clone()) as Arc<dyn EventStore>,
            status.clone(),
        );

        Self {
            store,
            status,
            router: router(state),
        }
    }
}

impl Default for ApiContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Test context with a real PostgreSQL store.
pub struct StoreContext {
    pub containers: TestContainers,
    pub store: PgStore,
}

impl StoreContext {
    /// Start PostgreSQL and create the parent tables.
    pub async fn new() -> Self {
        telemetry::init_test_tracing();
        let containers = TestContainers::start().await;

        let store = PgStore::connect(&containers.store_config())
            .await
            .expect("Failed to connect to PostgreSQL");

        partition_store::health::init_schema(store.pool())
            .await
            .expect("Failed to initialize schema");

        Self { containers, store }
    }

    /// Delete every event of one source, returning the number of rows removed.
    pub async fn delete_source(&self, source_id: &str) -> u64 {
        let mut deleted = 0;
        for kind in EventKind::ALL {
            let sql = format!("DELETE FROM {} WHERE source_id = $1", kind.table());
            deleted += sqlx::query(&sql)
                .bind(source_id)
                .execute(self.store.pool())
                .await
                .expect("Failed to delete source events")
                .rows_affected();
        }
        deleted
    }
}
