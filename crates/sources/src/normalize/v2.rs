//! Uniswap V2-style subgraphs (pairs; swaps, mints, and burns only).

use super::fields::{
    event_list, header, is_positive, opt_decimal, opt_str, parent_transaction, req_decimal, Amounts,
};
use harvest_core::{
    BurnDetails, CanonicalEvent, EventBatch, EventKind, EventPayload, MintDetails, Normalizer,
    ParentTransactionRef, RawPage, Result, SwapDetails,
};
use serde_json::Value;

/// Normalizer for V2-style `pair` schemas. Collects and flashes do not
/// exist there and are always empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniswapV2Normalizer;

impl Normalizer for UniswapV2Normalizer {
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
        }

        Ok(batch)
    }
}

/// The `In` leg when it is non-zero, else the `Out` leg.
fn swap_leg(record: &Value, token: u8, label: &str) -> Result<String> {
    let amount_in = req_decimal(record, &format!("amount{}In", token), label)?;
    let amount_out = req_decimal(record, &format!("amount{}Out", token), label)?;
    Ok(if is_positive(&amount_in) {
        amount_in
    } else {
        amount_out
    })
}

fn swap(source_id: &str, tx: &ParentTransactionRef, record: &Value) -> Result<CanonicalEvent> {
    let h = header(record, "pair", EventKind::Swap, tx)?;
    let amounts = Amounts {
        amount0: swap_leg(record, 0, &h.label)?,
        amount1: swap_leg(record, 1, &h.label)?,
        amount_usd: req_decimal(record, "amountUSD", &h.label)?,
    };
    let details = SwapDetails {
        sender: opt_str(record, "sender"),
        recipient: opt_str(record, "to"),
        origin: opt_str(record, "from"),
        tick: None,
        sqrt_price_x96: None,
    };
    Ok(h.into_event(source_id, tx, amounts, None, EventPayload::Swap(details)))
}

fn mint(source_id: &str, tx: &ParentTransactionRef, record: &Value) -> Result<CanonicalEvent> {
    let h = header(record, "pair", EventKind::Mint, tx)?;
    let amounts = Amounts::read(record, &h.label)?;
    let liquidity = opt_decimal(record, "liquidity", &h.label)?;
    let details = MintDetails {
        owner: opt_str(record, "to"),
        sender: opt_str(record, "sender"),
        ..Default::default()
    };
    Ok(h.into_event(source_id, tx, amounts, liquidity, EventPayload::Mint(details)))
}

fn burn(source_id: &str, tx: &ParentTransactionRef, record: &Value) -> Result<CanonicalEvent> {
    let h = header(record, "pair", EventKind::Burn, tx)?;
    let amounts = Amounts::read(record, &h.label)?;
    let liquidity = opt_decimal(record, "liquidity", &h.label)?;
    let details = BurnDetails {
        owner: opt_str(record, "to"),
        sender: opt_str(record, "sender"),
        ..Default::default()
    };
    Ok(h.into_event(source_id, tx, amounts, liquidity, EventPayload::Burn(details)))
}
