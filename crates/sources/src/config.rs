//! Source configuration.

use harvest_core::limits::DEFAULT_PAGE_SIZE;
use harvest_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subgraph schema family a source speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Pools with all five event kinds.
    UniswapV3,
    /// Pairs with swaps, mints, and burns.
    UniswapV2,
    /// V3-style pools without collects or flashes.
    Aerodrome,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UniswapV3 => "uniswap_v3",
            Self::UniswapV2 => "uniswap_v2",
            Self::Aerodrome => "aerodrome",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uniswap_v3" => Ok(Self::UniswapV3),
            "uniswap_v2" => Ok(Self::UniswapV2),
            "aerodrome" => Ok(Self::Aerodrome),
            other => Err(Error::config(format!("unsupported protocol: {}", other))),
        }
    }
}

/// One configured subgraph source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source id, stored on every event
    pub id: String,
    pub protocol: Protocol,
    /// GraphQL endpoint
    pub url: String,
    /// Records per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token for hosted gateways
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_timeout_secs() -> u64 {
    30
}

impl SourceConfig {
    pub fn new(id: impl Into<String>, protocol: Protocol, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            protocol,
            url: url.into(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }

    /// Checks the id, endpoint URL, and page size.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::config("source id must not be empty"));
        }
        if self.page_size == 0 {
            return Err(Error::config(format!("source {}: page_size must be positive", self.id)));
        }

        let url = url::Url::parse(&self.url)
            .map_err(|e| Error::config(format!("source {}: invalid url {}: {}", self.id, self.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "source {}: url scheme must be http or https",
                self.id
            )));
        }

        Ok(())
    }
}
