//! Mock implementations for testing.
//!
//! `MockAdapter` and `MockStore` implement the same traits as the subgraph
//! adapter and the PostgreSQL store, so the pipeline and scheduler run their
//! production code paths against in-memory state.

use async_trait::async_trait;
use harvest_core::{
    CanonicalEvent, Error, EventBatch, EventCounts, EventKind, RawPage, Result, SourceAdapter,
    TimeWindow, TokenMetadata,
};
use parking_lot::Mutex;
use partition_store::partition::months_covering;
use partition_store::{EventStore, PartitionReport, UpsertReport};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

/// One call made to a `MockAdapter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchCall {
    pub window: TimeWindow,
    pub skip: u64,
    pub first: usize,
}

/// Adapter that replays a script of pages and errors.
///
/// Once the script runs out it returns empty pages, or the fallback error
/// when one is set.
#[derive(Clone)]
pub struct MockAdapter {
    script: Arc<Mutex<VecDeque<Result<RawPage>>>>,
    fallback: Option<fn() -> Error>,
    calls: Arc<Mutex<Vec<FetchCall>>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replays `pages` in order.
    pub fn with_pages(pages: Vec<RawPage>) -> Self {
        let adapter = Self::new();
        for page in pages {
            adapter.push_page(page);
        }
        adapter
    }

    /// Fails every call with the error produced by `error`.
    pub fn failing(error: fn() -> Error) -> Self {
        Self {
            fallback: Some(error),
            ..Self::new()
        }
    }

    pub fn push_page(&self, page: RawPage) {
        self.script.lock().push_back(Ok(page));
    }

    pub fn push_error(&self, error: Error) {
        self.script.lock().push_back(Err(error));
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// The `skip` of every call, in order.
    pub fn offsets(&self) -> Vec<u64> {
        self.calls.lock().iter().map(|c| c.skip).collect()
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    async fn fetch(
        &self,
        _source_id: &str,
        window: TimeWindow,
        skip: u64,
        first: usize,
    ) -> Result<RawPage> {
        self.calls.lock().push(FetchCall { window, skip, first });

        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }
        match self.fallback {
            Some(error) => Err(error()),
            None => Ok(RawPage::default()),
        }
    }
}

/// In-memory event store keyed like the real one.
///
/// Events are deduplicated on `(timestamp, id)` per kind and tokens follow
/// last-write-wins.
#[derive(Clone, Default)]
pub struct MockStore {
    events: Arc<Mutex<BTreeMap<(EventKind, i64, String), CanonicalEvent>>>,
    tokens: Arc<Mutex<HashMap<String, TokenMetadata>>>,
    partitions: Arc<Mutex<BTreeSet<String>>>,
    ensured: Arc<Mutex<Vec<TimeWindow>>>,
    upsert_calls: Arc<Mutex<u32>>,
    /// Upcoming upserts that fail with `StoreWrite`
    pending_failures: Arc<Mutex<u32>>,
    fail_always: Arc<Mutex<bool>>,
    healthy: Arc<Mutex<Option<bool>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` upserts with a retryable error.
    pub fn fail_next_upserts(&self, n: u32) {
        *self.pending_failures.lock() = n;
    }

    /// Fail every upsert with a retryable error.
    pub fn set_fail_always(&self, fail: bool) {
        *self.fail_always.lock() = fail;
    }

    /// Override the connection check result.
    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock() = Some(healthy);
    }

    /// Stored events of `kind`, ordered by (timestamp, id).
    pub fn events(&self, kind: EventKind) -> Vec<CanonicalEvent> {
        self.events
            .lock()
            .iter()
            .filter(|((k, _, _), _)| *k == kind)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn token(&self, id: &str) -> Option<TokenMetadata> {
        self.tokens.lock().get(id).cloned()
    }

    /// Partition tables created so far.
    pub fn partitions(&self) -> Vec<String> {
        self.partitions.lock().iter().cloned().collect()
    }

    /// Windows passed to `ensure_partitions`, in order.
    pub fn ensured_windows(&self) -> Vec<TimeWindow> {
        self.ensured.lock().clone()
    }

    pub fn upsert_calls(&self) -> u32 {
        *self.upsert_calls.lock()
    }
}

#[async_trait]
impl EventStore for MockStore {
    async fn ensure_partitions(&self, window: &TimeWindow) -> Result<PartitionReport> {
        self.ensured.lock().push(*window);

        let mut report = PartitionReport::default();
        let mut partitions = self.partitions.lock();
        for month in months_covering(window)? {
            for kind in EventKind::ALL {
                if partitions.insert(month.table_name(kind)) {
                    report.created += 1;
                } else {
                    report.existing += 1;
                }
            }
        }
        Ok(report)
    }

    async fn batch_upsert(&self, batch: &EventBatch) -> Result<UpsertReport> {
        *self.upsert_calls.lock() += 1;

        if *self.fail_always.lock() {
            return Err(Error::store_write("mock store unavailable"));
        }
        {
            let mut pending = self.pending_failures.lock();
            if *pending > 0 {
                *pending -= 1;
                return Err(Error::store_write("mock connection reset"));
            }
        }

        let mut inserted = EventCounts::default();
        let mut events = self.events.lock();
        for (kind, list) in batch.iter() {
            for event in list {
                let key = (kind, event.timestamp, event.id.clone());
                if !events.contains_key(&key) {
                    events.insert(key, event.clone());
                    inserted.add(kind, 1);
                }
            }
        }

        let tokens = batch.token_metadata();
        let tokens_upserted = tokens.len();
        let mut stored = self.tokens.lock();
        for token in tokens {
            stored.insert(token.id.clone(), token);
        }

        Ok(UpsertReport {
            inserted,
            tokens_upserted,
        })
    }

    async fn check_connection(&self) -> bool {
        self.healthy.lock().unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{swap_page, MARCH_2024};
    use harvest_core::Normalizer;
    use sources::UniswapV3Normalizer;

    #[tokio::test]
    async fn test_mock_adapter_replays_script() {
        let adapter = MockAdapter::with_pages(vec![swap_page(0, 2, MARCH_2024)]);
        adapter.push_error(Error::fatal_fetch("boom"));
        let window = TimeWindow::new(MARCH_2024, MARCH_2024 + 60).unwrap();

        assert_eq!(adapter.fetch("s", window, 0, 10).await.unwrap().len(), 2);
        assert!(adapter.fetch("s", window, 2, 10).await.is_err());
        assert!(adapter.fetch("s", window, 2, 10).await.unwrap().is_empty());
        assert_eq!(adapter.offsets(), vec![0, 2, 2]);
    }

    #[tokio::test]
    async fn test_mock_store_dedups_on_timestamp_and_id() {
        let store = MockStore::new();
        let batch = UniswapV3Normalizer
            .normalize("s", &swap_page(0, 3, MARCH_2024))
            .unwrap();

        let first = store.batch_upsert(&batch).await.unwrap();
        let second = store.batch_upsert(&batch).await.unwrap();

        assert_eq!(first.inserted.swaps, 3);
        assert_eq!(second.inserted.total(), 0);
        assert_eq!(store.event_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_store_failure_mode() {
        let store = MockStore::new();
        store.fail_next_upserts(1);

        let err = store.batch_upsert(&EventBatch::new()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.batch_upsert(&EventBatch::new()).await.is_ok());
    }
}
