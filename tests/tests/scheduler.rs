//! Scheduler tests: per-source isolation, concurrency bound, and shutdown.

use async_trait::async_trait;
use harvest_core::{Error, RawPage, Result, SourceAdapter, TimeWindow};
use integration_tests::fixtures::{swap_page, MARCH_2024};
use integration_tests::mocks::{MockAdapter, MockStore};
use integration_tests::setup::{mock_engine, mock_source};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use worker::{shutdown_channel, RunOutcome, RunStatusRegistry, Scheduler, SchedulerConfig};

const HOUR: i64 = 3_600;

fn scheduler_config(max_concurrent_sources: usize) -> SchedulerConfig {
    SchedulerConfig {
        poll_interval_secs: 3_600,
        max_concurrent_sources,
        lookback_secs: 86_400,
    }
}

/// One failing source never affects the others, across ticks.
#[tokio::test]
async fn test_failing_source_isolated() {
    let store = MockStore::new();
    let healthy_a = MockAdapter::with_pages(vec![
        swap_page(0, 3, MARCH_2024),
        swap_page(100, 2, MARCH_2024 + HOUR),
    ]);
    let healthy_c = MockAdapter::with_pages(vec![
        swap_page(200, 4, MARCH_2024 + 10),
        swap_page(300, 1, MARCH_2024 + HOUR + 10),
    ]);
    let broken = MockAdapter::failing(|| Error::fatal_fetch("unsupported schema"));

    let sources = vec![
        mock_source("a", healthy_a, 1000),
        mock_source("b", broken.clone(), 1000),
        mock_source("c", healthy_c, 1000),
    ];
    let status = Arc::new(RunStatusRegistry::new());
    let scheduler = Scheduler::new(
        sources,
        Arc::new(mock_engine(&store)),
        scheduler_config(5),
        status.clone(),
    );

    let first = TimeWindow::new(MARCH_2024, MARCH_2024 + HOUR).unwrap();
    let second = TimeWindow::new(MARCH_2024 + HOUR, MARCH_2024 + 2 * HOUR).unwrap();

    for window in [first, second] {
        let runs = scheduler.run_tick(window).await;
        let ids: Vec<_> = runs.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        assert!(runs[0].outcome.is_success());
        assert!(runs[2].outcome.is_success());
        match &runs[1].outcome {
            RunOutcome::Failed { code, offset, .. } => {
                assert_eq!(code.as_deref(), Some("FETCH_002"));
                assert_eq!(*offset, 0);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    assert_eq!(broken.call_count(), 2);
    assert_eq!(store.event_count(), 3 + 2 + 4 + 1);

    let a = status.get("a").unwrap();
    assert_eq!(a.runs, 2);
    assert_eq!(a.consecutive_failures, 0);
    assert_eq!(a.last_run.unwrap().outcome.report().events_stored.swaps, 2);

    let b = status.get("b").unwrap();
    assert_eq!(b.runs, 2);
    assert_eq!(b.consecutive_failures, 2);
}

/// Adapter that panics on every fetch.
struct PanickingAdapter;

#[async_trait]
impl SourceAdapter for PanickingAdapter {
    async fn fetch(&self, _: &str, _: TimeWindow, _: u64, _: usize) -> Result<RawPage> {
        panic!("adapter bug");
    }
}

/// A panicking run is reported as a failure for that source only.
#[tokio::test]
async fn test_panicking_source_isolated() {
    let store = MockStore::new();
    let mut panicking = mock_source("p", MockAdapter::new(), 1000);
    panicking.adapter = Arc::new(PanickingAdapter);

    let sources = vec![
        mock_source("ok", MockAdapter::with_pages(vec![swap_page(0, 2, MARCH_2024)]), 1000),
        panicking,
    ];
    let scheduler = Scheduler::new(
        sources,
        Arc::new(mock_engine(&store)),
        scheduler_config(5),
        Arc::new(RunStatusRegistry::new()),
    );

    let runs = scheduler
        .run_tick(TimeWindow::new(MARCH_2024, MARCH_2024 + HOUR).unwrap())
        .await;

    assert_eq!(runs.len(), 2);
    assert!(runs[0].outcome.is_success());
    assert!(!runs[1].outcome.is_success());
    assert_eq!(store.event_count(), 2);
}

/// Adapter that records how many fetches are in flight at once.
struct GaugedAdapter {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceAdapter for GaugedAdapter {
    async fn fetch(&self, _: &str, _: TimeWindow, _: u64, _: usize) -> Result<RawPage> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(RawPage::default())
    }
}

/// No more than `max_concurrent_sources` runs execute at once.
#[tokio::test]
async fn test_concurrency_bound() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let sources = (0..6)
        .map(|i| {
            let mut source = mock_source(&format!("s{}", i), MockAdapter::new(), 1000);
            source.adapter = Arc::new(GaugedAdapter {
                in_flight: in_flight.clone(),
                peak: peak.clone(),
            });
            source
        })
        .collect();

    let store = MockStore::new();
    let scheduler = Scheduler::new(
        sources,
        Arc::new(mock_engine(&store)),
        scheduler_config(2),
        Arc::new(RunStatusRegistry::new()),
    );

    let runs = scheduler
        .run_tick(TimeWindow::new(MARCH_2024, MARCH_2024 + HOUR).unwrap())
        .await;

    assert_eq!(runs.len(), 6);
    assert!(runs.iter().all(|r| r.outcome.is_success()));
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak concurrency was {}", peak);
}

/// The loop runs the catch-up pass and exits once shutdown fires.
#[tokio::test]
async fn test_catch_up_then_shutdown() {
    let (trigger, shutdown) = shutdown_channel();
    let adapter = MockAdapter::new();
    let store = MockStore::new();
    let status = Arc::new(RunStatusRegistry::new());

    let scheduler = Arc::new(
        Scheduler::new(
            vec![mock_source("catch-up", adapter.clone(), 1000)],
            Arc::new(mock_engine(&store).with_shutdown(shutdown.clone())),
            scheduler_config(5),
            status.clone(),
        )
        .with_shutdown(shutdown),
    );
    let handle = scheduler.start();

    for _ in 0..100 {
        if status.get("catch-up").map(|s| s.runs).unwrap_or(0) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let catch_up = status.get("catch-up").unwrap().last_run.unwrap();
    assert_eq!(catch_up.window.end - catch_up.window.start, 86_400);
    assert_eq!(adapter.call_count(), 1);

    trigger.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop after shutdown")
        .unwrap();
}
