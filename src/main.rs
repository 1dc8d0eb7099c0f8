//! DEX Activity Harvester
//!
//! Periodically pulls swap, mint, burn, collect, and flash events from
//! subgraph sources, normalizes them into canonical records, and persists
//! them into monthly-partitioned PostgreSQL tables:
//! - Startup catch-up over the last 24 hours
//! - Fixed-interval ticks with bounded per-source concurrency
//! - Idempotent writes keyed on (timestamp, id)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use api::{router, AppState};
use partition_store::{EventStore, PgStore, StoreConfig};
use sources::{build_sources, SourceConfig};
use telemetry::{health, init_tracing_from_env};
use worker::{
    shutdown_channel, PipelineConfig, PipelineEngine, RunStatusRegistry, Scheduler,
    SchedulerConfig,
};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    database: StoreConfig,

    #[serde(default)]
    scheduler: SchedulerConfig,

    #[serde(default)]
    pipeline: PipelineConfig,

    #[serde(default)]
    sources: Vec<SourceConfig>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: StoreConfig::default(),
            scheduler: SchedulerConfig::default(),
            pipeline: PipelineConfig::default(),
            sources: Vec::new(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    if !init_tracing_from_env() {
        warn!("Tracing subscriber already installed, keeping it");
    }

    info!("Starting DEX harvester v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    info!(
        sources = config.sources.len(),
        poll_interval_secs = config.scheduler.poll_interval_secs,
        max_concurrent_sources = config.scheduler.max_concurrent_sources,
        "Loaded configuration"
    );

    let sources = build_sources(&config.sources).context("Invalid source configuration")?;
    if sources.is_empty() {
        warn!("No sources configured; the scheduler will idle");
    }

    let store = PgStore::connect(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;

    partition_store::health::init_schema(store.pool())
        .await
        .context("Failed to initialize PostgreSQL schema")?;

    check_health(&store).await;

    let store: Arc<dyn EventStore> = Arc::new(store);
    let (trigger, shutdown) = shutdown_channel();

    let engine = Arc::new(
        PipelineEngine::new(store.clone(), config.pipeline.clone()).with_shutdown(shutdown.clone()),
    );
    let status = Arc::new(RunStatusRegistry::new());
    let scheduler = Arc::new(
        Scheduler::new(sources, engine, config.scheduler.clone(), status.clone())
            .with_shutdown(shutdown),
    );
    let scheduler_handle = scheduler.start();

    let app = router(AppState::new(store, status));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down...");

    // Let the in-flight tick finish its current page
    trigger.trigger();
    if let Err(e) = scheduler_handle.await {
        error!("Scheduler task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("HARVESTER")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The config crate cannot express a list of tables through env vars
    if let Ok(sources) = std::env::var("HARVESTER_SOURCES") {
        config.sources = serde_json::from_str(&sources)
            .context("HARVESTER_SOURCES must be a JSON array of sources")?;
    }
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = url;
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(store: &PgStore) {
    if store.check_connection().await {
        health().postgres.set_healthy();
        info!("PostgreSQL connection: healthy");
    } else {
        health().postgres.set_unhealthy("Connection failed");
        error!("PostgreSQL connection: unhealthy");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
