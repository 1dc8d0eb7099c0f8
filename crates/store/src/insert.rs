//! Idempotent batch inserts.

use crate::schema::EVENT_COLUMNS;
use harvest_core::limits::MAX_BIND_PARAMS;
use harvest_core::{CanonicalEvent, Error, EventBatch, EventCounts, EventKind, Result, TokenMetadata};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::time::Instant;
use telemetry::metrics;
use tracing::debug;

/// Event rows per INSERT statement.
const EVENT_ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMS / EVENT_COLUMNS.len();

/// Token rows per upsert statement (id, symbol, name).
const TOKEN_ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMS / 3;

/// Result of one batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Rows actually inserted per kind; duplicates are not counted.
    pub inserted: EventCounts,
    /// Distinct tokens written to `token_metadata`.
    pub tokens_upserted: usize,
}

/// An event flattened for binding. JSON columns are serialized up front.
struct EventRow<'a> {
    event: &'a CanonicalEvent,
    parent_transaction: Value,
    details: Value,
}

impl<'a> EventRow<'a> {
    fn new(event: &'a CanonicalEvent) -> Result<Self> {
        Ok(Self {
            event,
            parent_transaction: serde_json::to_value(&event.transaction)?,
            details: serde_json::to_value(&event.payload)?,
        })
    }
}

/// Writes every event in `batch` plus the token metadata it carries, in one
/// transaction.
///
/// Rows whose `(timestamp, id)` already exists are skipped. Partitions for
/// the batch's span must exist beforehand.
pub async fn batch_upsert(pool: &PgPool, batch: &EventBatch) -> Result<UpsertReport> {
    let start = Instant::now();
    let mut report = UpsertReport::default();

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::store_write(format!("failed to begin transaction: {}", e)))?;

    for (kind, events) in batch.iter() {
        for chunk in events.chunks(EVENT_ROWS_PER_STATEMENT) {
            let inserted = insert_events(&mut tx, kind, chunk).await?;
            report.inserted.add(kind, inserted);
        }
    }

    // Sorted by id: concurrent batches take token row locks in one order.
    let tokens = batch.token_metadata();
    for chunk in tokens.chunks(TOKEN_ROWS_PER_STATEMENT) {
        upsert_tokens(&mut tx, chunk).await?;
    }
    report.tokens_upserted = tokens.len();

    tx.commit()
        .await
        .map_err(|e| Error::store_write(format!("failed to commit batch: {}", e)))?;

    let submitted = batch.len() as u64;
    let stored = report.inserted.total();
    let m = metrics();
    m.events_stored.inc_by(stored);
    m.duplicates_absorbed.inc_by(submitted.saturating_sub(stored));
    m.tokens_upserted.inc_by(report.tokens_upserted as u64);
    m.store_latency_ms.observe(start.elapsed().as_millis() as u64);

    debug!(
        submitted = submitted,
        stored = stored,
        tokens = report.tokens_upserted,
        "Batch upserted"
    );

    Ok(report)
}

async fn insert_events(
    tx: &mut Transaction<'_, Postgres>,
    kind: EventKind,
    events: &[CanonicalEvent],
) -> Result<u64> {
    if events.is_empty() {
        return Ok(0);
    }

    let rows = events.iter().map(EventRow::new).collect::<Result<Vec<_>>>()?;

    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        kind.table(),
        EVENT_COLUMNS.join(", ")
    ));

    query_builder.push_values(rows.iter(), |mut b, row| {
        let e = row.event;
        b.push_bind(&e.id)
            .push_bind(e.timestamp)
            .push_bind(&e.source_id)
            .push_bind(e.pool_id.as_deref())
            .push_bind(&e.pair.token0.id)
            .push_bind(&e.pair.token0.symbol)
            .push_bind(&e.pair.token0.name)
            .push_bind(&e.pair.token1.id)
            .push_bind(&e.pair.token1.symbol)
            .push_bind(&e.pair.token1.name)
            .push_bind(&e.amount0)
            .push_unseparated("::numeric")
            .push_bind(&e.amount1)
            .push_unseparated("::numeric")
            .push_bind(&e.amount_usd)
            .push_unseparated("::numeric")
            .push_bind(e.payload.sender())
            .push_bind(e.payload.recipient())
            .push_bind(e.payload.owner())
            .push_bind(e.payload.origin())
            .push_bind(e.fee_tier)
            .push_bind(e.liquidity.as_deref())
            .push_unseparated("::numeric")
            .push_bind(e.log_index)
            .push_bind(e.transaction.block_number)
            .push_bind(&row.parent_transaction)
            .push_bind(&row.details);
    });

    query_builder.push(" ON CONFLICT (timestamp, id) DO NOTHING");

    let result = query_builder
        .build()
        .execute(&mut **tx)
        .await
        .map_err(|e| Error::store_write(format!("insert into {} failed: {}", kind.table(), e)))?;

    Ok(result.rows_affected())
}

/// Last write wins. `tokens` must not repeat an id within one statement.
async fn upsert_tokens(tx: &mut Transaction<'_, Postgres>, tokens: &[TokenMetadata]) -> Result<()> {
    if tokens.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO token_metadata (id, symbol, name) ");

    query_builder.push_values(tokens.iter(), |mut b, token| {
        b.push_bind(&token.id)
            .push_bind(&token.symbol)
            .push_bind(&token.name);
    });

    query_builder.push(
        " ON CONFLICT (id) DO UPDATE SET symbol = EXCLUDED.symbol, name = EXCLUDED.name, updated_at = now()",
    );

    query_builder
        .build()
        .execute(&mut **tx)
        .await
        .map_err(|e| Error::store_write(format!("token metadata upsert failed: {}", e)))?;

    Ok(())
}
