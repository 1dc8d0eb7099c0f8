//! Canonical DEX event model.
//!
//! Every source schema is normalized into [`CanonicalEvent`]. Kind-specific
//! fields live in [`EventPayload`]; everything the store indexes on is common.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::source::TimeWindow;

/// Event kinds harvested from DEX sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Swap,
    Mint,
    Burn,
    Collect,
    Flash,
}

impl EventKind {
    /// All kinds, in storage order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Swap,
        EventKind::Mint,
        EventKind::Burn,
        EventKind::Collect,
        EventKind::Flash,
    ];

    /// Returns the kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Swap => "swap",
            Self::Mint => "mint",
            Self::Burn => "burn",
            Self::Collect => "collect",
            Self::Flash => "flash",
        }
    }

    /// Returns the partitioned parent table for this kind.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Swap => "swaps",
            Self::Mint => "mints",
            Self::Burn => "burns",
            Self::Collect => "collects",
            Self::Flash => "flashes",
        }
    }

    /// Whether token metadata is harvested from events of this kind.
    pub fn carries_token_metadata(&self) -> bool {
        matches!(self, Self::Swap | Self::Mint | Self::Burn)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "swap" | "swaps" => Ok(Self::Swap),
            "mint" | "mints" => Ok(Self::Mint),
            "burn" | "burns" => Ok(Self::Burn),
            "collect" | "collects" => Ok(Self::Collect),
            "flash" | "flashes" => Ok(Self::Flash),
            other => Err(Error::config(format!("unknown event kind: {}", other))),
        }
    }
}

/// Token descriptor as reported by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRef {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

/// Token pair of the pool (or pair) the event happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub token0: TokenRef,
    pub token1: TokenRef,
}

/// Provenance of an event, duplicated onto every event of the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentTransactionRef {
    pub id: String,
    pub block_number: i64,
    pub timestamp: i64,
    pub gas_used: Option<String>,
    pub gas_price: Option<String>,
}

/// Swap-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapDetails {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub origin: Option<String>,
    pub tick: Option<i64>,
    pub sqrt_price_x96: Option<String>,
}

/// Mint-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintDetails {
    pub owner: Option<String>,
    pub sender: Option<String>,
    pub origin: Option<String>,
    pub tick_lower: Option<i64>,
    pub tick_upper: Option<i64>,
}

/// Burn-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnDetails {
    pub owner: Option<String>,
    pub sender: Option<String>,
    pub origin: Option<String>,
    pub tick_lower: Option<i64>,
    pub tick_upper: Option<i64>,
}

/// Collect-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectDetails {
    pub owner: Option<String>,
    pub recipient: Option<String>,
    pub tick_lower: Option<i64>,
    pub tick_upper: Option<i64>,
}

/// Flash-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashDetails {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount0_paid: Option<String>,
    pub amount1_paid: Option<String>,
}

/// Kind-tagged event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventPayload {
    Swap(SwapDetails),
    Mint(MintDetails),
    Burn(BurnDetails),
    Collect(CollectDetails),
    Flash(FlashDetails),
}

impl EventPayload {
    /// Returns the event kind.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Swap(_) => EventKind::Swap,
            Self::Mint(_) => EventKind::Mint,
            Self::Burn(_) => EventKind::Burn,
            Self::Collect(_) => EventKind::Collect,
            Self::Flash(_) => EventKind::Flash,
        }
    }

    pub fn sender(&self) -> Option<&str> {
        match self {
            Self::Swap(d) => d.sender.as_deref(),
            Self::Mint(d) => d.sender.as_deref(),
            Self::Burn(d) => d.sender.as_deref(),
            Self::Flash(d) => d.sender.as_deref(),
            Self::Collect(_) => None,
        }
    }

    pub fn recipient(&self) -> Option<&str> {
        match self {
            Self::Swap(d) => d.recipient.as_deref(),
            Self::Collect(d) => d.recipient.as_deref(),
            Self::Flash(d) => d.recipient.as_deref(),
            Self::Mint(_) | Self::Burn(_) => None,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        match self {
            Self::Mint(d) => d.owner.as_deref(),
            Self::Burn(d) => d.owner.as_deref(),
            Self::Collect(d) => d.owner.as_deref(),
            Self::Swap(_) | Self::Flash(_) => None,
        }
    }

    pub fn origin(&self) -> Option<&str> {
        match self {
            Self::Swap(d) => d.origin.as_deref(),
            Self::Mint(d) => d.origin.as_deref(),
            Self::Burn(d) => d.origin.as_deref(),
            Self::Collect(_) | Self::Flash(_) => None,
        }
    }
}

/// A normalized DEX event. Created once per page, never mutated after storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Source-unique identifier.
    pub id: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub source_id: String,
    pub pool_id: Option<String>,
    pub pair: TokenPair,
    pub amount0: String,
    pub amount1: String,
    pub amount_usd: String,
    pub fee_tier: Option<i32>,
    pub liquidity: Option<String>,
    pub log_index: Option<i64>,
    pub transaction: ParentTransactionRef,
    pub payload: EventPayload,
}

impl CanonicalEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Token metadata discovered while processing events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub id: String,
    pub symbol: String,
    pub name: String,
}

impl From<&TokenRef> for TokenMetadata {
    fn from(token: &TokenRef) -> Self {
        Self {
            id: token.id.clone(),
            symbol: token.symbol.clone(),
            name: token.name.clone(),
        }
    }
}

/// Events of one page grouped by kind.
///
/// Every kind always has a (possibly empty) list, so callers never need to
/// special-case a kind a source does not model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    pub swaps: Vec<CanonicalEvent>,
    pub mints: Vec<CanonicalEvent>,
    pub burns: Vec<CanonicalEvent>,
    pub collects: Vec<CanonicalEvent>,
    pub flashes: Vec<CanonicalEvent>,
}

impl EventBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event to the list for its kind.
    pub fn push(&mut self, event: CanonicalEvent) {
        self.events_mut(event.kind()).push(event);
    }

    /// Returns the events of one kind.
    pub fn events(&self, kind: EventKind) -> &[CanonicalEvent] {
        match kind {
            EventKind::Swap => &self.swaps,
            EventKind::Mint => &self.mints,
            EventKind::Burn => &self.burns,
            EventKind::Collect => &self.collects,
            EventKind::Flash => &self.flashes,
        }
    }

    fn events_mut(&mut self, kind: EventKind) -> &mut Vec<CanonicalEvent> {
        match kind {
            EventKind::Swap => &mut self.swaps,
            EventKind::Mint => &mut self.mints,
            EventKind::Burn => &mut self.burns,
            EventKind::Collect => &mut self.collects,
            EventKind::Flash => &mut self.flashes,
        }
    }

    /// Iterates over every kind with its events, empty kinds included.
    pub fn iter(&self) -> impl Iterator<Item = (EventKind, &[CanonicalEvent])> {
        EventKind::ALL.into_iter().map(move |kind| (kind, self.events(kind)))
    }

    /// Total number of events across all kinds.
    pub fn len(&self) -> usize {
        EventKind::ALL.iter().map(|k| self.events(*k).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-kind event counts.
    pub fn counts(&self) -> EventCounts {
        let mut counts = EventCounts::default();
        for (kind, events) in self.iter() {
            counts.add(kind, events.len() as u64);
        }
        counts
    }

    /// Smallest window covering every event timestamp, if any.
    pub fn timestamp_span(&self) -> Option<TimeWindow> {
        let mut timestamps = EventKind::ALL
            .iter()
            .flat_map(|k| self.events(*k))
            .map(|e| e.timestamp);

        let first = timestamps.next()?;
        let (min, max) = timestamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));
        Some(TimeWindow { start: min, end: max })
    }

    /// Token metadata from swap, mint, and burn events.
    ///
    /// Collapsed by token id; the last occurrence in the batch wins. Returned
    /// in ascending id order so concurrent upserts lock shared rows in the
    /// same sequence.
    pub fn token_metadata(&self) -> Vec<TokenMetadata> {
        let mut latest: BTreeMap<String, TokenMetadata> = BTreeMap::new();

        for (kind, events) in self.iter() {
            if !kind.carries_token_metadata() {
                continue;
            }
            for event in events {
                for token in [&event.pair.token0, &event.pair.token1] {
                    latest.insert(token.id.clone(), TokenMetadata::from(token));
                }
            }
        }

        latest.into_values().collect()
    }
}

/// Per-kind counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    pub swaps: u64,
    pub mints: u64,
    pub burns: u64,
    pub collects: u64,
    pub flashes: u64,
}

impl EventCounts {
    pub fn get(&self, kind: EventKind) -> u64 {
        match kind {
            EventKind::Swap => self.swaps,
            EventKind::Mint => self.mints,
            EventKind::Burn => self.burns,
            EventKind::Collect => self.collects,
            EventKind::Flash => self.flashes,
        }
    }

    pub fn add(&mut self, kind: EventKind, n: u64) {
        match kind {
            EventKind::Swap => self.swaps += n,
            EventKind::Mint => self.mints += n,
            EventKind::Burn => self.burns += n,
            EventKind::Collect => self.collects += n,
            EventKind::Flash => self.flashes += n,
        }
    }

    pub fn merge(&mut self, other: &EventCounts) {
        for kind in EventKind::ALL {
            self.add(kind, other.get(kind));
        }
    }

    pub fn total(&self) -> u64 {
        EventKind::ALL.iter().map(|k| self.get(*k)).sum()
    }
}
