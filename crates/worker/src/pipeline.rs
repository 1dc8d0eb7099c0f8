//! Pipeline engine: fetch → normalize → store, page by page.
//!
//! One run drives one source across one window. Pages are requested at
//! strictly increasing offsets and each page is stored before the next is
//! fetched, so a run never reorders or skips records. Every committed page is
//! idempotent, which makes re-running an aborted window safe.

use harvest_core::schema::validate_batch;
use harvest_core::{
    retry, Error, EventBatch, EventCounts, RawPage, RetryPolicy, Source, TimeWindow,
};
use partition_store::{EventStore, PartitionReport, UpsertReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tracing::{debug, error, info};

use crate::shutdown::Shutdown;

/// Pipeline engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Attempts per fetch or store, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Pause between pages in milliseconds
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    harvest_core::limits::DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    harvest_core::limits::DEFAULT_RETRY_DELAY.as_millis() as u64
}

fn default_page_delay_ms() -> u64 {
    harvest_core::limits::DEFAULT_PAGE_DELAY.as_millis() as u64
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            page_delay_ms: default_page_delay_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Raw records fetched (transactions, for subgraph sources)
    pub transactions_processed: u64,
    /// Canonical events produced by normalization
    pub events_processed: u64,
    /// Rows actually inserted per kind, after dedup
    pub events_stored: EventCounts,
    /// Non-empty pages processed
    pub pages: u64,
    pub partitions_created: u64,
}

/// A run that stopped on a fatal error.
///
/// Everything in `report` was committed before the failure.
#[derive(Debug, thiserror::Error)]
#[error("run aborted at offset {offset}: {error}")]
pub struct RunAbort {
    #[source]
    pub error: Error,
    pub offset: u64,
    pub report: RunReport,
}

/// Drives sources through paginated fetch → normalize → store.
pub struct PipelineEngine {
    store: Arc<dyn EventStore>,
    config: PipelineConfig,
    shutdown: Shutdown,
}

impl PipelineEngine {
    pub fn new(store: Arc<dyn EventStore>, config: PipelineConfig) -> Self {
        Self {
            store,
            config,
            shutdown: Shutdown::never(),
        }
    }

    /// Stop between pages once `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Harvests `source` over `[start, end]`.
    pub async fn run(&self, source: &Source, start: i64, end: i64) -> Result<RunReport, RunAbort> {
        let mut report = RunReport::default();
        let mut offset: u64 = 0;

        let window = TimeWindow::new(start, end)
            .map_err(|e| self.abort(source, start, end, e, offset, report))?;

        let started = Instant::now();
        info!(source_id = %source.id, start, end, "Starting run");

        loop {
            if self.shutdown.is_triggered() {
                info!(source_id = %source.id, offset, "Shutdown requested, stopping run");
                break;
            }

            // FETCH
            let page = self
                .fetch_page(source, window, offset)
                .await
                .map_err(|e| self.abort(source, start, end, e, offset, report))?;

            let fetched = page.len();
            if fetched == 0 {
                break;
            }

            // NORMALIZE
            let batch = self
                .normalize_page(source, &window, &page)
                .map_err(|e| self.abort(source, start, end, e, offset, report))?;

            // STORE
            let (partitions, upserted) = self
                .store_batch(&batch)
                .await
                .map_err(|e| self.abort(source, start, end, e, offset, report))?;

            report.pages += 1;
            report.transactions_processed += fetched as u64;
            report.events_processed += batch.len() as u64;
            report.events_stored.merge(&upserted.inserted);
            report.partitions_created += partitions.created as u64;
            offset += fetched as u64;

            debug!(
                source_id = %source.id,
                offset,
                records = fetched,
                events = batch.len(),
                stored = upserted.inserted.total(),
                "Page committed"
            );

            if fetched < source.page_size {
                break;
            }

            if self.shutdown.sleep(self.config.page_delay()).await {
                info!(source_id = %source.id, offset, "Shutdown requested, stopping run");
                break;
            }
        }

        metrics().run_latency_ms.observe(started.elapsed().as_millis() as u64);
        info!(
            source_id = %source.id,
            start,
            end,
            pages = report.pages,
            transactions = report.transactions_processed,
            events = report.events_processed,
            stored = report.events_stored.total(),
            "Run complete"
        );

        Ok(report)
    }

    async fn fetch_page(
        &self,
        source: &Source,
        window: TimeWindow,
        offset: u64,
    ) -> harvest_core::Result<RawPage> {
        let adapter = &source.adapter;
        let source_id = source.id.as_str();
        let first = source.page_size;

        let page = retry(
            self.config.retry_policy(),
            "fetch",
            move || async move { adapter.fetch(source_id, window, offset, first).await },
            |_, _| metrics().fetch_retries.inc(),
        )
        .await
        .inspect_err(|_| metrics().fetch_errors.inc())?;

        metrics().pages_fetched.inc();
        metrics().records_fetched.inc_by(page.len() as u64);
        Ok(page)
    }

    fn normalize_page(
        &self,
        source: &Source,
        window: &TimeWindow,
        page: &RawPage,
    ) -> harvest_core::Result<EventBatch> {
        let batch = source
            .normalizer
            .normalize(&source.id, page)
            .and_then(|batch| validate_batch(&batch, window).map(|_| batch))
            .inspect_err(|_| metrics().malformed_pages.inc())?;

        metrics().events_normalized.inc_by(batch.len() as u64);
        Ok(batch)
    }

    /// Ensures partitions and upserts as one retried unit.
    async fn store_batch(
        &self,
        batch: &EventBatch,
    ) -> harvest_core::Result<(PartitionReport, UpsertReport)> {
        let Some(span) = batch.timestamp_span() else {
            return Ok((PartitionReport::default(), UpsertReport::default()));
        };
        let store = &self.store;

        retry(
            self.config.retry_policy(),
            "store",
            move || async move {
                let partitions = store.ensure_partitions(&span).await?;
                let upserted = store.batch_upsert(batch).await?;
                Ok((partitions, upserted))
            },
            |_, _| metrics().store_retries.inc(),
        )
        .await
        .inspect_err(|_| metrics().store_errors.inc())
    }

    fn abort(
        &self,
        source: &Source,
        start: i64,
        end: i64,
        error: Error,
        offset: u64,
        report: RunReport,
    ) -> RunAbort {
        error!(
            source_id = %source.id,
            start,
            end,
            offset,
            code = error.error_code().unwrap_or("-"),
            error = %error,
            "Run aborted"
        );
        RunAbort { error, offset, report }
    }
}
