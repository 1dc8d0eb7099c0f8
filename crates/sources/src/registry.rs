//! Source table construction.

use crate::config::{Protocol, SourceConfig};
use crate::normalize::{UniswapV2Normalizer, UniswapV3Normalizer};
use crate::subgraph::SubgraphAdapter;
use harvest_core::{Error, Normalizer, Result, Source};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Normalizer for a protocol's schema family.
pub fn normalizer_for(protocol: Protocol) -> Arc<dyn Normalizer> {
    match protocol {
        Protocol::UniswapV3 | Protocol::Aerodrome => Arc::new(UniswapV3Normalizer),
        Protocol::UniswapV2 => Arc::new(UniswapV2Normalizer),
    }
}

/// Builds the source table once at startup.
///
/// Rejects invalid entries and duplicate ids.
pub fn build_sources(configs: &[SourceConfig]) -> Result<Vec<Source>> {
    let mut seen = HashSet::new();
    let mut sources = Vec::with_capacity(configs.len());

    for config in configs {
        config.validate()?;
        if !seen.insert(config.id.as_str()) {
            return Err(Error::config(format!("duplicate source id: {}", config.id)));
        }

        let adapter = SubgraphAdapter::new(config)?;
        sources.push(Source::new(
            config.id.clone(),
            Arc::new(adapter),
            normalizer_for(config.protocol),
            config.page_size,
        ));

        info!(
            source_id = %config.id,
            protocol = %config.protocol,
            url = %config.url,
            page_size = config.page_size,
            "Configured source"
        );
    }

    Ok(sources)
}
