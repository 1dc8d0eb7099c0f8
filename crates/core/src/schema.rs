//! Validation of normalized batches against the run window.

use crate::error::{Error, Result};
use crate::events::EventBatch;
use crate::source::TimeWindow;

/// Rejects batches containing events outside `window`.
///
/// Adapters promise records within the requested window; an event outside it
/// means the source and normalizer disagree about timestamps.
pub fn validate_window(batch: &EventBatch, window: &TimeWindow) -> Result<()> {
    for (kind, events) in batch.iter() {
        if let Some(event) = events.iter().find(|e| !window.contains(e.timestamp)) {
            return Err(Error::malformed(format!(
                "{} {} has timestamp {} outside window {}",
                kind, event.id, event.timestamp, window
            )));
        }
    }
    Ok(())
}

/// Rejects events with blank ids.
pub fn validate_ids(batch: &EventBatch) -> Result<()> {
    for (kind, events) in batch.iter() {
        if events.iter().any(|e| e.id.trim().is_empty()) {
            return Err(Error::malformed(format!("{} with empty id", kind)));
        }
    }
    Ok(())
}

/// Runs every batch check.
pub fn validate_batch(batch: &EventBatch, window: &TimeWindow) -> Result<()> {
    validate_ids(batch)?;
    validate_window(batch, window)
}
