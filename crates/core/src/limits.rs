//! Default limits and intervals for the harvester.
//!
//! Configuration can override every value here except the bind-parameter
//! limit, which is a property of the PostgreSQL wire protocol.

use std::time::Duration;

// === Paging ===

/// Records requested per page when a source does not override it.
///
/// Subgraph indexers cap `first:` at 1000.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Pause between consecutive pages of one run.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(500);

// === Retry ===

/// Attempts per retried unit (fetch or store), including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

// === Scheduling ===

/// Interval between scheduler ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Sources processed concurrently within one tick.
pub const DEFAULT_MAX_CONCURRENT_SOURCES: usize = 5;

/// Window covered by the startup catch-up pass (24h).
pub const DEFAULT_LOOKBACK_SECS: i64 = 24 * 60 * 60;

// === Store ===

/// Maximum bind parameters in a single PostgreSQL statement.
///
/// Bulk inserts are chunked so `rows * columns` stays below this.
pub const MAX_BIND_PARAMS: usize = 65_535;
