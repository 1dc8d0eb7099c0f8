//! Source adapters and normalizers for DEX subgraphs.

pub mod config;
pub mod normalize;
pub mod queries;
pub mod registry;
pub mod subgraph;

pub use config::*;
pub use normalize::{UniswapV2Normalizer, UniswapV3Normalizer};
pub use registry::build_sources;
pub use subgraph::SubgraphAdapter;
