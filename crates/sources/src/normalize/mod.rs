//! Normalizers from subgraph records to canonical events.

mod fields;
pub mod v2;
pub mod v3;

pub use v2::UniswapV2Normalizer;
pub use v3::UniswapV3Normalizer;
