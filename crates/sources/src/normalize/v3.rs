//! Uniswap V3-style subgraphs (pools, all five kinds).

use super::fields::{event_list, header, opt_decimal, opt_i64, opt_str, parent_transaction, Amounts};
use harvest_core::{
    BurnDetails, CanonicalEvent, CollectDetails, EventBatch, EventKind, EventPayload, FlashDetails,
    MintDetails, Normalizer, ParentTransactionRef, RawPage, Result, SwapDetails,
};
use serde_json::Value;

/// Normalizer for V3-style `pool` schemas. Also serves V3 forks whose query
/// omits some event lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniswapV3Normalizer;

impl Normalizer for UniswapV3Normalizer {
    fn normalize(&self, source_id: &str, page: &RawPage) -> Result<EventBatch> {
        let mut batch = EventBatch::new();

        for tx_record in &page.records {
            let tx = parent_transaction(tx_record)?;

            for record in event_list(tx_record, "swaps", &tx.id)? {
                batch.push(swap(source_id, &tx, record)?);
            }
            for record in event_list(tx_record, "mints", &tx.id)? {
                batch.push(mint(source_id, &tx, record)?);
            }
            for record in event_list(tx_record, "burns", &tx.id)? {
                batch.push(burn(source_id, &tx, record)?);
            }
            for record in event_list(tx_record, "collects", &tx.id)? {
                batch.push(collect(source_id, &tx, record)?);
            }
            for record in event_list(tx_record, "flashed", &tx.id)? {
                batch.push(flash(source_id, &tx, record)?);
            }
        }

        Ok(batch)
    }
}

fn swap(source_id: &str, tx: &ParentTransactionRef, record: &Value) -> Result<CanonicalEvent> {
    let h = header(record, "pool", EventKind::Swap, tx)?;
    let amounts = Amounts::read(record, &h.label)?;
    let details = SwapDetails {
        sender: opt_str(record, "sender"),
        recipient: opt_str(record, "recipient"),
        origin: opt_str(record, "origin"),
        tick: opt_i64(record, "tick", &h.label)?,
        sqrt_price_x96: opt_decimal(record, "sqrtPriceX96", &h.label)?,
    };
    let liquidity = h.pool_liquidity.clone();
    Ok(h.into_event(source_id, tx, amounts, liquidity, EventPayload::Swap(details)))
}

fn mint(source_id: &str, tx: &ParentTransactionRef, record: &Value) -> Result<CanonicalEvent> {
    let h = header(record, "pool", EventKind::Mint, tx)?;
    let amounts = Amounts::read(record, &h.label)?;
    let details = MintDetails {
        owner: opt_str(record, "owner"),
        sender: opt_str(record, "sender"),
        origin: opt_str(record, "origin"),
        tick_lower: opt_i64(record, "tickLower", &h.label)?,
        tick_upper: opt_i64(record, "tickUpper", &h.label)?,
    };
    let liquidity = h.pool_liquidity.clone();
    Ok(h.into_event(source_id, tx, amounts, liquidity, EventPayload::Mint(details)))
}

fn burn(source_id: &str, tx: &ParentTransactionRef, record: &Value) -> Result<CanonicalEvent> {
    let h = header(record, "pool", EventKind::Burn, tx)?;
    let amounts = Amounts::read(record, &h.label)?;
    let details = BurnDetails {
        owner: opt_str(record, "owner"),
        sender: None,
        origin: opt_str(record, "origin"),
        tick_lower: opt_i64(record, "tickLower", &h.label)?,
        tick_upper: opt_i64(record, "tickUpper", &h.label)?,
    };
    let liquidity = h.pool_liquidity.clone();
    Ok(h.into_event(source_id, tx, amounts, liquidity, EventPayload::Burn(details)))
}

fn collect(source_id: &str, tx: &ParentTransactionRef, record: &Value) -> Result<CanonicalEvent> {
    let h = header(record, "pool", EventKind::Collect, tx)?;
    let amounts = Amounts::read(record, &h.label)?;
    let details = CollectDetails {
        owner: opt_str(record, "owner"),
        recipient: opt_str(record, "recipient"),
        tick_lower: opt_i64(record, "tickLower", &h.label)?,
        tick_upper: opt_i64(record, "tickUpper", &h.label)?,
    };
    let liquidity = h.pool_liquidity.clone();
    Ok(h.into_event(source_id, tx, amounts, liquidity, EventPayload::Collect(details)))
}

fn flash(source_id: &str, tx: &ParentTransactionRef, record: &Value) -> Result<CanonicalEvent> {
    let h = header(record, "pool", EventKind::Flash, tx)?;
    let amounts = Amounts::read(record, &h.label)?;
    let details = FlashDetails {
        sender: opt_str(record, "sender"),
        recipient: opt_str(record, "recipient"),
        amount0_paid: opt_decimal(record, "amount0Paid", &h.label)?,
        amount1_paid: opt_decimal(record, "amount1Paid", &h.label)?,
    };
    let liquidity = h.pool_liquidity.clone();
    Ok(h.into_event(source_id, tx, amounts, liquidity, EventPayload::Flash(details)))
}
