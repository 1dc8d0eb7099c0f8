//! GraphQL query documents per protocol.
//!
//! Every document takes `$startTimestamp`, `$endTimestamp`, `$skip`, and
//! `$first`, and returns `transactions` ordered by timestamp ascending.

use crate::config::Protocol;

const TOKEN_FIELDS: &str = "id symbol name";

/// Returns the transaction query for `protocol`.
pub fn transactions_query(protocol: Protocol) -> String {
    match protocol {
        Protocol::UniswapV3 => uniswap_v3_query(),
        Protocol::UniswapV2 => uniswap_v2_query(),
        Protocol::Aerodrome => aerodrome_query(),
    }
}

fn transactions_wrapper(tx_fields: &str, events: &str) -> String {
    format!(
        r#"query GetTransactions($startTimestamp: Int!, $endTimestamp: Int!, $skip: Int!, $first: Int!) {{
  transactions(
    first: $first
    skip: $skip
    where: {{ timestamp_gte: $startTimestamp, timestamp_lte: $endTimestamp }}
    orderBy: timestamp
    orderDirection: asc
  ) {{
    {tx_fields}
{events}
  }}
}}"#
    )
}

fn pool_fields() -> String {
    format!("pool {{ id token0 {{ {TOKEN_FIELDS} }} token1 {{ {TOKEN_FIELDS} }} feeTier liquidity }}")
}

fn pair_fields() -> String {
    format!("pair {{ id token0 {{ {TOKEN_FIELDS} }} token1 {{ {TOKEN_FIELDS} }} }}")
}

fn uniswap_v3_query() -> String {
    let pool = pool_fields();
    let events = format!(
        r#"    swaps {{ id timestamp {pool} sender recipient origin amount0 amount1 amountUSD sqrtPriceX96 tick logIndex }}
    mints {{ id timestamp {pool} owner sender origin amount0 amount1 amountUSD tickLower tickUpper logIndex }}
    burns {{ id timestamp {pool} owner origin amount0 amount1 amountUSD tickLower tickUpper logIndex }}
    collects {{ id timestamp {pool} owner recipient amount0 amount1 amountUSD tickLower tickUpper logIndex }}
    flashed {{ id timestamp {pool} sender recipient amount0 amount1 amountUSD amount0Paid amount1Paid logIndex }}"#
    );
    transactions_wrapper("id blockNumber timestamp gasUsed gasPrice", &events)
}

fn uniswap_v2_query() -> String {
    let pair = pair_fields();
    let events = format!(
        r#"    swaps {{ id timestamp {pair} sender from to amount0In amount1In amount0Out amount1Out amountUSD logIndex }}
    mints {{ id timestamp {pair} sender to liquidity amount0 amount1 amountUSD logIndex }}
    burns {{ id timestamp {pair} sender to liquidity amount0 amount1 amountUSD logIndex }}"#
    );
    transactions_wrapper("id blockNumber timestamp", &events)
}

fn aerodrome_query() -> String {
    let pool = pool_fields();
    let events = format!(
        r#"    swaps {{ id timestamp {pool} sender recipient amount0 amount1 amountUSD sqrtPriceX96 tick logIndex }}
    mints {{ id timestamp {pool} owner sender amount0 amount1 amountUSD tickLower tickUpper logIndex }}
    burns {{ id timestamp {pool} owner origin amount0 amount1 amountUSD tickLower tickUpper logIndex }}"#
    );
    transactions_wrapper("id blockNumber timestamp gasUsed gasPrice", &events)
}
