//! Core types, traits, and validation for the DEX harvester.

pub mod error;
pub mod events;
pub mod limits;
pub mod retry;
pub mod schema;
pub mod source;

pub use error::{Error, Result};
pub use events::*;
pub use retry::{retry, RetryPolicy};
pub use source::*;
