//! Subgraph response fixtures.

use harvest_core::RawPage;
use serde_json::{json, Value};

/// Start of March 2024, UTC.
pub const MARCH_2024: i64 = 1_709_251_200;

/// Start of April 2024, UTC.
pub const APRIL_2024: i64 = 1_711_929_600;

/// A V3 pool with USDC/WETH.
pub fn pool(token0_symbol: &str) -> Value {
    json!({
        "id": "0x88e6a0c2ddd26feeb64f039a2c41296fcb3f5640",
        "token0": {"id": "0xa0b86991", "symbol": token0_symbol, "name": "USD Coin"},
        "token1": {"id": "0xc02aaa39", "symbol": "WETH", "name": "Wrapped Ether"},
        "feeTier": "500",
        "liquidity": "21419234223434"
    })
}

/// A V3 swap record.
pub fn swap(id: &str, timestamp: i64) -> Value {
    json!({
        "id": id,
        "timestamp": timestamp.to_string(),
        "pool": pool("USDC"),
        "sender": "0xe592427a",
        "recipient": "0xuser",
        "origin": "0xuser",
        "amount0": "-2500.5",
        "amount1": "1.0",
        "amountUSD": "2500.5",
        "sqrtPriceX96": "1584563250285286751870879006720000",
        "tick": "-201234",
        "logIndex": "7"
    })
}

/// A V3 transaction carrying the given swaps.
pub fn transaction(id: &str, timestamp: i64, swaps: Vec<Value>) -> Value {
    json!({
        "id": id,
        "blockNumber": "19400000",
        "timestamp": timestamp.to_string(),
        "gasUsed": "150000",
        "gasPrice": "25000000000",
        "swaps": swaps,
        "mints": [],
        "burns": []
    })
}

/// A transaction with one swap, ids derived from `n`.
pub fn swap_transaction(n: usize, timestamp: i64) -> Value {
    let tx_id = format!("0xtx{:06}", n);
    let swap_id = format!("{}#1", tx_id);
    transaction(&tx_id, timestamp, vec![swap(&swap_id, timestamp)])
}

/// A page of `n` single-swap transactions, numbered from `first_n`.
///
/// Timestamps step by one second from `start`.
pub fn swap_page(first_n: usize, n: usize, start: i64) -> RawPage {
    let records = (0..n)
        .map(|i| swap_transaction(first_n + i, start + i as i64))
        .collect();
    RawPage::new(records)
}

/// A transaction whose only swap has no `amountUSD`.
pub fn transaction_missing_amount_usd(timestamp: i64) -> Value {
    let mut record = swap("0xbad#1", timestamp);
    if let Some(obj) = record.as_object_mut() {
        obj.remove("amountUSD");
    }
    transaction("0xbad", timestamp, vec![record])
}

/// A subgraph response body wrapping `transactions`.
pub fn graphql_response(transactions: Vec<Value>) -> Value {
    json!({ "data": { "transactions": transactions } })
}

/// A subgraph response body carrying GraphQL errors.
pub fn graphql_error(message: &str) -> Value {
    json!({ "errors": [{ "message": message }] })
}
