//! Source adapter and normalizer seams.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::EventBatch;

/// Inclusive time window in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    /// Create a window, rejecting `start > end`.
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if start > end {
            return Err(Error::internal(format!(
                "invalid time window: start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Window of `lookback_secs` ending at `end`.
    pub fn lookback(end: i64, lookback_secs: i64) -> Self {
        Self {
            start: end.saturating_sub(lookback_secs.max(0)),
            end,
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Whether `other` lies entirely within this window.
    pub fn covers(&self, other: &TimeWindow) -> bool {
        self.contains(other.start) && self.contains(other.end)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// One source-native record, kept as untyped JSON until normalization.
pub type RawRecord = serde_json::Value;

/// An ordered page of raw records. Empty means the window is exhausted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPage {
    pub records: Vec<RawRecord>,
}

impl RawPage {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fetches pages of raw records from an external indexer.
///
/// Records are returned with non-decreasing timestamps inside the window.
/// Network and 5xx-class failures are reported as `TransientFetch`; anything
/// that cannot succeed on retry as `FatalFetch`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(
        &self,
        source_id: &str,
        window: TimeWindow,
        skip: u64,
        first: usize,
    ) -> Result<RawPage>;
}

/// Maps a raw page into canonical events grouped by kind.
///
/// Must be pure. A record missing a required field fails the whole page
/// with `MalformedData`.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, source_id: &str, page: &RawPage) -> Result<EventBatch>;
}

/// A configured source. Immutable after startup.
#[derive(Clone)]
pub struct Source {
    pub id: String,
    pub adapter: Arc<dyn SourceAdapter>,
    pub normalizer: Arc<dyn Normalizer>,
    /// Full-page size; a shorter page ends the run.
    pub page_size: usize,
}

impl Source {
    pub fn new(
        id: impl Into<String>,
        adapter: Arc<dyn SourceAdapter>,
        normalizer: Arc<dyn Normalizer>,
        page_size: usize,
    ) -> Self {
        Self {
            id: id.into(),
            adapter,
            normalizer,
            page_size: page_size.max(1),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.id)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
