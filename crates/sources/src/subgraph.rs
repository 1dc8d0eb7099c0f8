//! GraphQL subgraph adapter over HTTP.

use crate::config::SourceConfig;
use crate::queries::transactions_query;
use async_trait::async_trait;
use harvest_core::{Error, RawPage, Result, SourceAdapter, TimeWindow};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use telemetry::metrics;
use tracing::debug;

/// Fetches `transactions` pages from a subgraph endpoint.
#[derive(Debug, Clone)]
pub struct SubgraphAdapter {
    client: Client,
    url: String,
    query: String,
    api_key: Option<String>,
}

impl SubgraphAdapter {
    /// Creates an adapter for one configured source.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("dex-harvester/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            query: transactions_query(config.protocol),
            api_key: config.api_key.clone(),
        })
    }

    /// Endpoint this adapter posts to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SourceAdapter for SubgraphAdapter {
    async fn fetch(
        &self,
        source_id: &str,
        window: TimeWindow,
        skip: u64,
        first: usize,
    ) -> Result<RawPage> {
        let body = json!({
            "query": self.query,
            "variables": {
                "startTimestamp": window.start,
                "endTimestamp": window.end,
                "skip": skip,
                "first": first,
            }
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|e| classify_send_error(source_id, e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            Error::transient_fetch(format!("{}: failed to read response body: {}", source_id, e))
        })?;
        metrics().fetch_latency_ms.observe(started.elapsed().as_millis() as u64);

        if let Some(err) = classify_status(source_id, status, &text) {
            return Err(err);
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            Error::fatal_fetch(format!("{}: response is not JSON: {}", source_id, e))
        })?;

        let page = parse_response(source_id, body)?;
        debug!(
            source_id = source_id,
            skip = skip,
            records = page.len(),
            "Fetched subgraph page"
        );
        Ok(page)
    }
}

fn classify_send_error(source_id: &str, err: reqwest::Error) -> Error {
    if err.is_builder() {
        Error::fatal_fetch(format!("{}: invalid request: {}", source_id, err))
    } else {
        Error::transient_fetch(format!("{}: request failed: {}", source_id, err))
    }
}

/// Maps a non-success status to its fetch error. 5xx and 429 are transient.
pub fn classify_status(source_id: &str, status: StatusCode, body: &str) -> Option<Error> {
    if status.is_success() {
        return None;
    }

    let snippet: String = body.chars().take(200).collect();
    let msg = format!("{}: HTTP {}: {}", source_id, status, snippet);

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Some(Error::transient_fetch(msg))
    } else {
        Some(Error::fatal_fetch(msg))
    }
}

/// Extracts `data.transactions` from a GraphQL response.
///
/// A non-empty `errors` array or a missing `transactions` list is fatal; the
/// same request would fail the same way again.
pub fn parse_response(source_id: &str, mut body: Value) -> Result<RawPage> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .map(|e| e.get("message").and_then(Value::as_str).unwrap_or("unknown error"))
                .collect();
            return Err(Error::fatal_fetch(format!(
                "{}: GraphQL errors: {}",
                source_id,
                messages.join("; ")
            )));
        }
    }

    match body.pointer_mut("/data/transactions").map(Value::take) {
        Some(Value::Array(records)) => Ok(RawPage::new(records)),
        _ => Err(Error::fatal_fetch(format!(
            "{}: response has no data.transactions list",
            source_id
        ))),
    }
}
