//! Monthly partition management.
//!
//! Each event table is range-partitioned on `timestamp` into calendar months
//! (UTC). Partitions are `[first second of month, first second of next month)`
//! and named `<table>_<YYYY>_<MM>`. They are created on demand and never
//! dropped here.

use chrono::{DateTime, Datelike, NaiveDate};
use harvest_core::{Error, EventKind, Result, TimeWindow};
use parking_lot::RwLock;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::{debug, info};

/// One calendar month in Unix seconds, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthPartition {
    pub year: i32,
    pub month: u32,
    pub start: i64,
    pub end: i64,
}

impl MonthPartition {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };

        Ok(Self {
            year,
            month,
            start: month_start(year, month)?,
            end: month_start(next_year, next_month)?,
        })
    }

    /// The month containing `timestamp`.
    pub fn containing(timestamp: i64) -> Result<Self> {
        let dt = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| Error::malformed(format!("timestamp {} out of range", timestamp)))?;
        Self::new(dt.year(), dt.month())
    }

    pub fn next(&self) -> Result<Self> {
        Self::containing(self.end)
    }

    /// Physical table name for `kind`, e.g. `swaps_2024_03`.
    pub fn table_name(&self, kind: EventKind) -> String {
        format!("{}_{:04}_{:02}", kind.table(), self.year, self.month)
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

fn month_start(year: i32, month: u32) -> Result<i64> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| Error::internal(format!("invalid month {}-{}", year, month)))
}

/// Every month touched by `window`, snapped outward to month boundaries.
pub fn months_covering(window: &TimeWindow) -> Result<Vec<MonthPartition>> {
    let last = MonthPartition::containing(window.end)?;
    let mut month = MonthPartition::containing(window.start)?;
    let mut months = vec![month];

    while month.start < last.start {
        month = month.next()?;
        months.push(month);
    }

    Ok(months)
}

/// Outcome of an ensure call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionReport {
    pub created: usize,
    pub existing: usize,
}

impl PartitionReport {
    pub fn merge(&mut self, other: PartitionReport) {
        self.created += other.created;
        self.existing += other.existing;
    }
}

/// Partition names known to exist, shared by all runs in the process.
///
/// Only a cache: the database stays the source of truth, so a stale or empty
/// catalog costs one existence query per partition.
#[derive(Debug, Default)]
pub struct PartitionCatalog {
    known: RwLock<HashSet<String>>,
}

impl PartitionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.known.read().contains(name)
    }

    pub fn insert(&self, name: String) {
        self.known.write().insert(name);
    }

    pub fn len(&self) -> usize {
        self.known.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every cached partition.
    pub fn clear(&self) {
        self.known.write().clear();
    }
}

/// Whether a DDL error means another writer created the partition first.
///
/// `42P07` is duplicate_table; `23505` surfaces when two sessions race on the
/// catalog's unique index for the relation name.
pub fn is_already_exists(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("42P07") | Some("23505")),
        _ => false,
    }
}

async fn partition_exists(pool: &PgPool, name: &str) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relname = $1 AND n.nspname = current_schema()
        )
        "#,
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(|e| Error::store_write(format!("catalog lookup for {} failed: {}", name, e)))
}

/// Maps a failed `CREATE TABLE … PARTITION OF`. Only errors the server
/// returned for the DDL itself are partition failures; losing the
/// connection on the way is an ordinary store write failure.
fn ddl_error(name: &str, err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Database(_) => Error::partition_creation(format!("{}: {}", name, err)),
        other => Error::store_write(format!("creating {} failed: {}", name, other)),
    }
}

/// Creates one partition. Returns `false` if it already existed.
async fn create_partition(pool: &PgPool, kind: EventKind, month: &MonthPartition) -> Result<bool> {
    let name = month.table_name(kind);
    let ddl = format!(
        "CREATE TABLE {} PARTITION OF {} FOR VALUES FROM ({}) TO ({})",
        name,
        kind.table(),
        month.start,
        month.end
    );

    match sqlx::query(&ddl).execute(pool).await {
        Ok(_) => Ok(true),
        Err(e) if is_already_exists(&e) => {
            debug!(partition = %name, "Partition created concurrently");
            Ok(false)
        }
        Err(e) => Err(ddl_error(&name, e)),
    }
}

/// Ensures a partition exists for every kind and every month covering
/// `window`. Idempotent and safe under concurrent callers.
pub async fn ensure_partitions(
    pool: &PgPool,
    catalog: &PartitionCatalog,
    window: &TimeWindow,
) -> Result<PartitionReport> {
    let mut report = PartitionReport::default();

    for month in months_covering(window)? {
        for kind in EventKind::ALL {
            let name = month.table_name(kind);

            if catalog.contains(&name) {
                report.existing += 1;
                continue;
            }

            if partition_exists(pool, &name).await? {
                catalog.insert(name);
                report.existing += 1;
                continue;
            }

            if create_partition(pool, kind, &month).await? {
                info!(partition = %name, start = month.start, end = month.end, "Created partition");
                report.created += 1;
            } else {
                report.existing += 1;
            }
            catalog.insert(name);
        }
    }

    if report.created > 0 {
        telemetry::metrics().partitions_created.inc_by(report.created as u64);
    }

    Ok(report)
}
