//! Pipeline engine tests against an in-memory store.
//!
//! Pages flow through the real V3 normalizer and the real retry policy;
//! only the subgraph and PostgreSQL are replaced.

use harvest_core::{Error, EventKind, RawPage};
use integration_tests::fixtures::{
    swap_page, swap_transaction, transaction_missing_amount_usd, APRIL_2024, MARCH_2024,
};
use integration_tests::mocks::{MockAdapter, MockStore};
use integration_tests::setup::{mock_engine, mock_source};
use worker::shutdown_channel;

const HOUR: i64 = 3_600;

/// Three pages of 1000, 1000 and 400 records end after exactly three fetches.
#[tokio::test]
async fn test_paginates_until_short_page() {
    let adapter = MockAdapter::with_pages(vec![
        swap_page(0, 1000, MARCH_2024),
        swap_page(1000, 1000, MARCH_2024 + 1000),
        swap_page(2000, 400, MARCH_2024 + 2000),
    ]);
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter.clone(), 1000);

    let report = mock_engine(&store)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .expect("run should complete");

    assert_eq!(adapter.offsets(), vec![0, 1000, 2000]);
    assert!(adapter.calls().iter().all(|c| c.first == 1000));
    assert_eq!(report.pages, 3);
    assert_eq!(report.transactions_processed, 2400);
    assert_eq!(report.events_processed, 2400);
    assert_eq!(report.events_stored.swaps, 2400);
    assert_eq!(store.events(EventKind::Swap).len(), 2400);
}

/// Every fetch covers the run window unchanged.
#[tokio::test]
async fn test_fetch_uses_run_window() {
    let adapter = MockAdapter::with_pages(vec![swap_page(0, 3, MARCH_2024 + 10)]);
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter.clone(), 1000);

    mock_engine(&store)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .unwrap();

    let calls = adapter.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].window.start, MARCH_2024);
    assert_eq!(calls[0].window.end, MARCH_2024 + HOUR);
}

/// An empty first page completes with nothing written.
#[tokio::test]
async fn test_empty_window_completes() {
    let adapter = MockAdapter::new();
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter.clone(), 1000);

    let report = mock_engine(&store)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .unwrap();

    assert_eq!(adapter.call_count(), 1);
    assert_eq!(report.pages, 0);
    assert_eq!(report.events_stored.total(), 0);
    assert_eq!(store.upsert_calls(), 0);
    assert!(store.ensured_windows().is_empty());
}

/// A full final page needs one more fetch that comes back empty.
#[tokio::test]
async fn test_full_last_page_followed_by_empty_page() {
    let adapter = MockAdapter::with_pages(vec![swap_page(0, 5, MARCH_2024)]);
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter.clone(), 5);

    let report = mock_engine(&store)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .unwrap();

    assert_eq!(adapter.offsets(), vec![0, 5]);
    assert_eq!(report.events_stored.swaps, 5);
}

/// A source that always fails transiently is tried three times, then the run fails.
#[tokio::test]
async fn test_transient_fetch_exhausts_retries() {
    let adapter = MockAdapter::failing(|| Error::transient_fetch("502 Bad Gateway"));
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter.clone(), 1000);

    let abort = mock_engine(&store)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .expect_err("run should fail");

    assert_eq!(adapter.call_count(), 3);
    assert!(matches!(
        abort.error,
        Error::RetriesExhausted { attempts: 3, .. }
    ));
    assert_eq!(abort.error.error_code(), Some("FETCH_001"));
    assert_eq!(abort.offset, 0);
    assert_eq!(store.upsert_calls(), 0);
}

/// A transient failure followed by success does not fail the run.
#[tokio::test]
async fn test_transient_fetch_recovers() {
    let adapter = MockAdapter::new();
    adapter.push_error(Error::transient_fetch("timeout"));
    adapter.push_page(swap_page(0, 2, MARCH_2024));
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter.clone(), 1000);

    let report = mock_engine(&store)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .unwrap();

    assert_eq!(adapter.offsets(), vec![0, 0]);
    assert_eq!(report.events_stored.swaps, 2);
}

/// Fatal fetch errors are never retried.
#[tokio::test]
async fn test_fatal_fetch_not_retried() {
    let adapter = MockAdapter::failing(|| Error::fatal_fetch("400 Bad Request"));
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter.clone(), 1000);

    let abort = mock_engine(&store)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .unwrap_err();

    assert_eq!(adapter.call_count(), 1);
    assert!(matches!(abort.error, Error::FatalFetch(_)));
}

/// A record missing amountUSD fails its page and commits nothing from it.
#[tokio::test]
async fn test_malformed_page_commits_nothing() {
    let page = RawPage::new(vec![
        swap_transaction(0, MARCH_2024),
        transaction_missing_amount_usd(MARCH_2024 + 1),
        swap_transaction(2, MARCH_2024 + 2),
    ]);
    let adapter = MockAdapter::with_pages(vec![page]);
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter.clone(), 1000);

    let abort = mock_engine(&store)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .unwrap_err();

    assert!(matches!(abort.error, Error::MalformedData(_)));
    assert_eq!(adapter.call_count(), 1);
    assert_eq!(store.upsert_calls(), 0);
    assert_eq!(store.event_count(), 0);
}

/// Pages committed before a malformed page stay committed.
#[tokio::test]
async fn test_malformed_later_page_keeps_earlier_pages() {
    let adapter = MockAdapter::with_pages(vec![
        swap_page(0, 2, MARCH_2024),
        RawPage::new(vec![transaction_missing_amount_usd(MARCH_2024 + 5)]),
    ]);
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter.clone(), 2);

    let abort = mock_engine(&store)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .unwrap_err();

    assert_eq!(abort.offset, 2);
    assert_eq!(abort.report.pages, 1);
    assert_eq!(abort.report.events_stored.swaps, 2);
    assert_eq!(store.event_count(), 2);
}

/// Events outside the requested window are rejected before storage.
#[tokio::test]
async fn test_event_outside_window_rejected() {
    let adapter = MockAdapter::with_pages(vec![swap_page(0, 1, MARCH_2024 + 2 * HOUR)]);
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter, 1000);

    let abort = mock_engine(&store)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .unwrap_err();

    assert!(matches!(abort.error, Error::MalformedData(_)));
    assert_eq!(store.event_count(), 0);
}

/// A failed store attempt is retried as a unit.
#[tokio::test]
async fn test_store_write_retried() {
    let adapter = MockAdapter::with_pages(vec![swap_page(0, 3, MARCH_2024)]);
    let store = MockStore::new();
    store.fail_next_upserts(2);
    let source = mock_source("uni-v3", adapter, 1000);

    let report = mock_engine(&store)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .unwrap();

    assert_eq!(store.upsert_calls(), 3);
    assert_eq!(store.ensured_windows().len(), 3);
    assert_eq!(report.events_stored.swaps, 3);
}

/// A store that never recovers fails the run after three attempts.
#[tokio::test]
async fn test_store_write_exhausts_retries() {
    let adapter = MockAdapter::with_pages(vec![swap_page(0, 3, MARCH_2024)]);
    let store = MockStore::new();
    store.set_fail_always(true);
    let source = mock_source("uni-v3", adapter, 1000);

    let abort = mock_engine(&store)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .unwrap_err();

    assert_eq!(store.upsert_calls(), 3);
    assert_eq!(abort.error.error_code(), Some("STORE_002"));
}

/// Running the same window twice stores nothing new the second time.
#[tokio::test]
async fn test_rerun_is_idempotent() {
    let store = MockStore::new();
    let engine = mock_engine(&store);

    let first = mock_source(
        "uni-v3",
        MockAdapter::with_pages(vec![swap_page(0, 10, MARCH_2024)]),
        1000,
    );
    let report = engine.run(&first, MARCH_2024, MARCH_2024 + HOUR).await.unwrap();
    assert_eq!(report.events_stored.swaps, 10);

    let second = mock_source(
        "uni-v3",
        MockAdapter::with_pages(vec![swap_page(0, 10, MARCH_2024)]),
        1000,
    );
    let report = engine.run(&second, MARCH_2024, MARCH_2024 + HOUR).await.unwrap();
    assert_eq!(report.events_processed, 10);
    assert_eq!(report.events_stored.total(), 0);
    assert_eq!(store.event_count(), 10);
}

/// A page straddling a month boundary gets both partitions before insert.
#[tokio::test]
async fn test_partitions_cover_month_boundary() {
    let adapter = MockAdapter::with_pages(vec![swap_page(0, 2, APRIL_2024 - 1)]);
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter, 1000);

    let report = mock_engine(&store)
        .run(&source, MARCH_2024, APRIL_2024 + HOUR)
        .await
        .unwrap();

    let ensured = store.ensured_windows();
    assert_eq!(ensured.len(), 1);
    assert_eq!(ensured[0].start, APRIL_2024 - 1);
    assert_eq!(ensured[0].end, APRIL_2024);

    let partitions = store.partitions();
    assert!(partitions.contains(&"swaps_2024_03".to_string()));
    assert!(partitions.contains(&"swaps_2024_04".to_string()));
    assert_eq!(report.partitions_created, 10);
}

/// An inverted window fails before any fetch.
#[tokio::test]
async fn test_inverted_window_rejected() {
    let adapter = MockAdapter::new();
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter.clone(), 1000);

    let abort = mock_engine(&store)
        .run(&source, MARCH_2024 + HOUR, MARCH_2024)
        .await
        .unwrap_err();

    assert!(matches!(abort.error, Error::Internal(_)));
    assert_eq!(adapter.call_count(), 0);
}

/// A run that starts after shutdown does not fetch.
#[tokio::test]
async fn test_shutdown_stops_before_fetch() {
    let (trigger, shutdown) = shutdown_channel();
    trigger.trigger();

    let adapter = MockAdapter::with_pages(vec![swap_page(0, 2, MARCH_2024)]);
    let store = MockStore::new();
    let source = mock_source("uni-v3", adapter.clone(), 1000);

    let report = mock_engine(&store)
        .with_shutdown(shutdown)
        .run(&source, MARCH_2024, MARCH_2024 + HOUR)
        .await
        .unwrap();

    assert_eq!(adapter.call_count(), 0);
    assert_eq!(report.pages, 0);
}
