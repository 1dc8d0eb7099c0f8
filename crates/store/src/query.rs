//! Query functions for reading data back (used in tests and admin).

use harvest_core::{Error, EventKind, Result, TimeWindow, TokenMetadata};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

fn query_err(e: sqlx::Error) -> Error {
    Error::internal(format!("Query error: {}", e))
}

/// Stored event row for verification.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredEventRow {
    pub id: String,
    pub timestamp: i64,
    pub source_id: String,
    pub pool_id: Option<String>,
    pub token0_symbol: String,
    pub token1_symbol: String,
    pub amount0: String,
    pub amount1: String,
    pub amount_usd: String,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub owner: Option<String>,
    pub origin: Option<String>,
    pub block_number: i64,
    pub parent_transaction: serde_json::Value,
    pub details: serde_json::Value,
}

/// Count events of `kind`, optionally for one source.
pub async fn count_events(pool: &PgPool, kind: EventKind, source_id: Option<&str>) -> Result<i64> {
    let sql = format!(
        "SELECT count(*) FROM {} WHERE ($1::text IS NULL OR source_id = $1)",
        kind.table()
    );
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(source_id)
        .fetch_one(pool)
        .await
        .map_err(query_err)
}

/// Fetch events of `kind` within `window`, oldest first.
pub async fn query_events(
    pool: &PgPool,
    kind: EventKind,
    window: &TimeWindow,
    limit: i64,
) -> Result<Vec<StoredEventRow>> {
    let sql = format!(
        r#"
        SELECT id, timestamp, source_id, pool_id, token0_symbol, token1_symbol,
               amount0::text AS amount0, amount1::text AS amount1, amount_usd::text AS amount_usd,
               sender, recipient, owner, origin, block_number, parent_transaction, details
        FROM {}
        WHERE timestamp >= $1 AND timestamp <= $2
        ORDER BY timestamp, id
        LIMIT $3
        "#,
        kind.table()
    );
    sqlx::query_as::<_, StoredEventRow>(&sql)
        .bind(window.start)
        .bind(window.end)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(query_err)
}

/// Physical partitions attached to the table of `kind`, ordered by name.
pub async fn list_partitions(pool: &PgPool, kind: EventKind) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT child.relname::text
        FROM pg_inherits
        JOIN pg_class parent ON parent.oid = pg_inherits.inhparent
        JOIN pg_class child ON child.oid = pg_inherits.inhrelid
        WHERE parent.relname = $1
        ORDER BY child.relname
        "#,
    )
    .bind(kind.table())
    .fetch_all(pool)
    .await
    .map_err(query_err)
}

/// Fetch token metadata by id.
pub async fn get_token(pool: &PgPool, id: &str) -> Result<Option<TokenMetadata>> {
    let row: Option<(String, String, String)> =
        sqlx::query_as("SELECT id, symbol, name FROM token_metadata WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(query_err)?;

    Ok(row.map(|(id, symbol, name)| TokenMetadata { id, symbol, name }))
}
