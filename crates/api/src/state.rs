//! Application state shared across handlers.

use partition_store::EventStore;
use std::sync::Arc;
use worker::RunStatusRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Event store (PostgreSQL in production, in-memory in tests)
    pub store: Arc<dyn EventStore>,
    /// Last run outcome per source
    pub status: Arc<RunStatusRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>, status: Arc<RunStatusRegistry>) -> Self {
        Self { store, status }
    }
}
