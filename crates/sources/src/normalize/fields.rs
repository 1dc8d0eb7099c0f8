//! Typed accessors over raw subgraph JSON.
//!
//! Subgraphs encode BigInt and BigDecimal as strings; these helpers accept
//! either strings or JSON numbers and treat `null` as absent.

use harvest_core::{
    CanonicalEvent, Error, EventKind, EventPayload, ParentTransactionRef, Result, TokenPair,
    TokenRef,
};
use serde_json::Value;

fn field<'a>(record: &'a Value, name: &str) -> Option<&'a Value> {
    record.get(name).filter(|v| !v.is_null())
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn req_str(record: &Value, name: &str, label: &str) -> Result<String> {
    let value = field(record, name).ok_or_else(|| Error::missing_field(label, name))?;
    scalar(value).ok_or_else(|| {
        Error::malformed(format!("{} field '{}' is not a scalar", label, name))
    })
}

pub(crate) fn opt_str(record: &Value, name: &str) -> Option<String> {
    field(record, name).and_then(scalar)
}

fn parse_i64(raw: &str, name: &str, label: &str) -> Result<i64> {
    raw.trim().parse::<i64>().map_err(|_| {
        Error::malformed(format!("{} field '{}' is not an integer: {}", label, name, raw))
    })
}

pub(crate) fn req_i64(record: &Value, name: &str, label: &str) -> Result<i64> {
    parse_i64(&req_str(record, name, label)?, name, label)
}

pub(crate) fn opt_i64(record: &Value, name: &str, label: &str) -> Result<Option<i64>> {
    opt_str(record, name)
        .map(|raw| parse_i64(&raw, name, label))
        .transpose()
}

/// Whether `s` is a finite decimal number, exponent notation allowed.
pub(crate) fn is_decimal(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        && s.parse::<f64>().map(|v| v.is_finite()).unwrap_or(false)
}

fn check_decimal(raw: String, name: &str, label: &str) -> Result<String> {
    if is_decimal(&raw) {
        Ok(raw.trim().to_string())
    } else {
        Err(Error::malformed(format!(
            "{} field '{}' is not a decimal: {}",
            label, name, raw
        )))
    }
}

pub(crate) fn req_decimal(record: &Value, name: &str, label: &str) -> Result<String> {
    check_decimal(req_str(record, name, label)?, name, label)
}

pub(crate) fn opt_decimal(record: &Value, name: &str, label: &str) -> Result<Option<String>> {
    opt_str(record, name)
        .map(|raw| check_decimal(raw, name, label))
        .transpose()
}

pub(crate) fn is_positive(decimal: &str) -> bool {
    decimal.trim().parse::<f64>().map(|v| v > 0.0).unwrap_or(false)
}

fn req_object<'a>(record: &'a Value, name: &str, label: &str) -> Result<&'a Value> {
    match field(record, name) {
        Some(v) if v.is_object() => Ok(v),
        Some(_) => Err(Error::malformed(format!(
            "{} field '{}' is not an object",
            label, name
        ))),
        None => Err(Error::missing_field(label, name)),
    }
}

fn token(container: &Value, name: &str, label: &str) -> Result<TokenRef> {
    let token = req_object(container, name, label)?;
    let token_label = format!("{} {}", label, name);
    Ok(TokenRef {
        id: req_str(token, "id", &token_label)?,
        symbol: req_str(token, "symbol", &token_label)?,
        name: req_str(token, "name", &token_label)?,
    })
}

/// Event list `name` of a transaction. Absent means none.
pub(crate) fn event_list<'a>(tx: &'a Value, name: &str, tx_id: &str) -> Result<&'a [Value]> {
    match field(tx, name) {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(Error::malformed(format!(
            "transaction {} field '{}' is not a list",
            tx_id, name
        ))),
    }
}

/// Provenance of a raw transaction record.
pub(crate) fn parent_transaction(tx: &Value) -> Result<ParentTransactionRef> {
    let id = req_str(tx, "id", "transaction")?;
    let label = format!("transaction {}", id);
    Ok(ParentTransactionRef {
        block_number: req_i64(tx, "blockNumber", &label)?,
        timestamp: req_i64(tx, "timestamp", &label)?,
        gas_used: opt_str(tx, "gasUsed"),
        gas_price: opt_str(tx, "gasPrice"),
        id,
    })
}

/// Fields shared by every event, read before kind-specific ones.
pub(crate) struct Header {
    pub id: String,
    pub label: String,
    pub timestamp: i64,
    pub pool_id: Option<String>,
    pub pair: TokenPair,
    pub fee_tier: Option<i32>,
    pub pool_liquidity: Option<String>,
    pub log_index: Option<i64>,
}

/// Reads the common header. `container` is `pool` or `pair`.
///
/// The event timestamp falls back to the transaction's when the source
/// omits it on the event.
pub(crate) fn header(
    record: &Value,
    container: &str,
    kind: EventKind,
    tx: &ParentTransactionRef,
) -> Result<Header> {
    let id = req_str(record, "id", &format!("{} in transaction {}", kind, tx.id))?;
    let label = format!("{} {}", kind, id);

    let timestamp = match opt_i64(record, "timestamp", &label)? {
        Some(ts) => ts,
        None => tx.timestamp,
    };

    let pool = req_object(record, container, &label)?;
    let pool_label = format!("{} {}", label, container);
    let pair = TokenPair {
        token0: token(pool, "token0", &pool_label)?,
        token1: token(pool, "token1", &pool_label)?,
    };

    let fee_tier = opt_i64(pool, "feeTier", &pool_label)?
        .map(|fee| {
            i32::try_from(fee).map_err(|_| {
                Error::malformed(format!("{} feeTier out of range: {}", pool_label, fee))
            })
        })
        .transpose()?;

    Ok(Header {
        pool_id: opt_str(pool, "id"),
        pool_liquidity: opt_decimal(pool, "liquidity", &pool_label)?,
        log_index: opt_i64(record, "logIndex", &label)?,
        fee_tier,
        pair,
        timestamp,
        label,
        id,
    })
}

/// Token amounts of one event.
pub(crate) struct Amounts {
    pub amount0: String,
    pub amount1: String,
    pub amount_usd: String,
}

impl Amounts {
    /// Reads `amount0`, `amount1`, and `amountUSD`.
    pub fn read(record: &Value, label: &str) -> Result<Self> {
        Ok(Self {
            amount0: req_decimal(record, "amount0", label)?,
            amount1: req_decimal(record, "amount1", label)?,
            amount_usd: req_decimal(record, "amountUSD", label)?,
        })
    }
}

impl Header {
    pub fn into_event(
        self,
        source_id: &str,
        tx: &ParentTransactionRef,
        amounts: Amounts,
        liquidity: Option<String>,
        payload: EventPayload,
    ) -> CanonicalEvent {
        CanonicalEvent {
            id: self.id,
            timestamp: self.timestamp,
            source_id: source_id.to_string(),
            pool_id: self.pool_id,
            pair: self.pair,
            amount0: amounts.amount0,
            amount1: amounts.amount1,
            amount_usd: amounts.amount_usd,
            fee_tier: self.fee_tier,
            liquidity,
            log_index: self.log_index,
            transaction: tx.clone(),
            payload,
        }
    }
}
