//! Last run outcome per source.

use chrono::{DateTime, Utc};
use harvest_core::TimeWindow;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::pipeline::RunReport;

/// How a source's run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed {
        report: RunReport,
    },
    Failed {
        error: String,
        code: Option<String>,
        offset: u64,
        /// Work committed before the failure.
        partial: RunReport,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Report of committed work, complete or partial.
    pub fn report(&self) -> &RunReport {
        match self {
            Self::Completed { report } => report,
            Self::Failed { partial, .. } => partial,
        }
    }
}

/// One source's run within one tick.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRun {
    pub source_id: String,
    pub window: TimeWindow,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
}

/// Status exposed for one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub source_id: String,
    pub runs: u64,
    pub consecutive_failures: u64,
    pub last_run: Option<SourceRun>,
}

/// Keeps the latest run of every source.
#[derive(Debug, Default)]
pub struct RunStatusRegistry {
    sources: RwLock<BTreeMap<String, SourceStatus>>,
}

impl RunStatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source with no runs yet.
    pub fn register(&self, source_id: &str) {
        self.sources
            .write()
            .entry(source_id.to_string())
            .or_insert_with(|| SourceStatus {
                source_id: source_id.to_string(),
                runs: 0,
                consecutive_failures: 0,
                last_run: None,
            });
    }

    pub fn record(&self, run: &SourceRun) {
        let mut sources = self.sources.write();
        let status = sources
            .entry(run.source_id.clone())
            .or_insert_with(|| SourceStatus {
                source_id: run.source_id.clone(),
                runs: 0,
                consecutive_failures: 0,
                last_run: None,
            });

        status.runs += 1;
        if run.outcome.is_success() {
            status.consecutive_failures = 0;
        } else {
            status.consecutive_failures += 1;
        }
        status.last_run = Some(run.clone());
    }

    pub fn get(&self, source_id: &str) -> Option<SourceStatus> {
        self.sources.read().get(source_id).cloned()
    }

    /// All sources ordered by id.
    pub fn snapshot(&self) -> Vec<SourceStatus> {
        self.sources.read().values().cloned().collect()
    }
}
