//! PostgreSQL table schemas.
//!
//! Every event kind gets its own parent table with an identical layout:
//! - `timestamp BIGINT` (Unix seconds) as the range partition key
//! - primary key `(timestamp, id)` so re-delivery is absorbed
//! - participant and token columns for filtering, kind-specific fields in
//!   `details`, provenance in `parent_transaction`
//!
//! Monthly child partitions are created on demand by [`crate::partition`].

use harvest_core::EventKind;

/// Columns written by the bulk insert, in bind order.
pub const EVENT_COLUMNS: [&str; 23] = [
    "id",
    "timestamp",
    "source_id",
    "pool_id",
    "token0_id",
    "token0_symbol",
    "token0_name",
    "token1_id",
    "token1_symbol",
    "token1_name",
    "amount0",
    "amount1",
    "amount_usd",
    "sender",
    "recipient",
    "owner",
    "origin",
    "fee_tier",
    "liquidity",
    "log_index",
    "block_number",
    "parent_transaction",
    "details",
];

/// DDL for the partitioned parent table of `kind`.
pub fn create_event_table(kind: EventKind) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id TEXT NOT NULL,
    timestamp BIGINT NOT NULL,
    source_id TEXT NOT NULL,
    pool_id TEXT,

    -- Token pair
    token0_id TEXT NOT NULL,
    token0_symbol TEXT NOT NULL,
    token0_name TEXT NOT NULL,
    token1_id TEXT NOT NULL,
    token1_symbol TEXT NOT NULL,
    token1_name TEXT NOT NULL,

    -- Amounts
    amount0 NUMERIC NOT NULL,
    amount1 NUMERIC NOT NULL,
    amount_usd NUMERIC NOT NULL,

    -- Participants (kind-dependent)
    sender TEXT,
    recipient TEXT,
    owner TEXT,
    origin TEXT,

    -- Pool state
    fee_tier INTEGER,
    liquidity NUMERIC,
    log_index BIGINT,

    -- Provenance
    block_number BIGINT NOT NULL,
    parent_transaction JSONB NOT NULL,

    -- Kind-specific fields
    details JSONB NOT NULL,

    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (timestamp, id)
) PARTITION BY RANGE (timestamp)
"#,
        table = kind.table()
    )
}

/// Secondary indexes for `kind`. Declared on the parent, so every
/// partition inherits them.
pub fn create_event_indexes(kind: EventKind) -> Vec<String> {
    let table = kind.table();
    vec![
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_source_timestamp ON {table} (source_id, timestamp)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_tokens ON {table} (token0_symbol, token1_symbol)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_timestamp_brin ON {table} USING BRIN (timestamp)"
        ),
    ]
}

/// DDL for the token metadata table.
pub const CREATE_TOKEN_METADATA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS token_metadata (
    id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL,
    name TEXT NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

/// Returns all DDL statements in execution order.
pub fn all_statements() -> Vec<String> {
    let mut statements = Vec::new();
    for kind in EventKind::ALL {
        statements.push(create_event_table(kind));
        statements.extend(create_event_indexes(kind));
    }
    statements.push(CREATE_TOKEN_METADATA_TABLE.to_string());
    statements
}
