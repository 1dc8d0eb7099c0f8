//! Internal telemetry for the DEX harvester.
//!
//! Structured logging, in-process counters, and component health. No
//! external metrics system is required.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
