//! Harvest workers.
//!
//! - Pipeline engine (fetch → normalize → store for one source and window)
//! - Scheduler (catch-up pass, then fixed-interval ticks across all sources)
//! - Run status registry (last outcome per source)

pub mod pipeline;
pub mod scheduler;
pub mod shutdown;
pub mod status;

pub use pipeline::*;
pub use scheduler::*;
pub use shutdown::*;
pub use status::*;
