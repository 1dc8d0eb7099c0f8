//! Tracing setup for structured logging.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the config names one.
///
/// sqlx logs every statement at `info`; batch upserts make that unreadable.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Log output settings for the harvester binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Directive string, e.g. "info,worker=debug,sqlx=warn"
    pub filter: String,
    /// One JSON object per line instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Read `RUST_LOG` and `LOG_JSON`.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::var("RUST_LOG").ok(), std::env::var("LOG_JSON").ok())
    }

    fn from_vars(filter: Option<String>, json: Option<String>) -> Self {
        let json = json
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let filter = filter
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        Self { filter, json }
    }
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed; the existing one
/// stays in place and `config` is ignored.
pub fn init_tracing(config: &LogConfig) -> bool {
    let (env_filter, bad_filter) = match EnvFilter::try_new(&config.filter) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(DEFAULT_FILTER), Some(e)),
    };

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .try_init()
            .is_ok()
    };

    if !installed {
        tracing::debug!(filter = %config.filter, "Tracing already initialized, keeping existing subscriber");
        return false;
    }

    if let Some(e) = bad_filter {
        tracing::warn!(filter = %config.filter, error = %e, "Invalid log filter, using {}", DEFAULT_FILTER);
    }
    tracing::info!(filter = %config.filter, json = config.json, "Tracing initialized");
    true
}

/// Initialize tracing from `RUST_LOG` and `LOG_JSON`.
pub fn init_tracing_from_env() -> bool {
    init_tracing(&LogConfig::from_env())
}

/// Compact test logging routed through the libtest capture, filtered by
/// `RUST_LOG` (default `warn`). Safe to call from every test.
pub fn init_test_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().compact().with_test_writer())
        .try_init()
        .ok();
}
