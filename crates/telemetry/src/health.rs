//! Health check aggregation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Health status for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

/// Component health state.
#[derive(Debug)]
pub struct ComponentHealth {
    name: &'static str,
    healthy: AtomicBool,
    message: parking_lot::RwLock<Option<String>>,
}

impl ComponentHealth {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            healthy: AtomicBool::new(false),
            message: parking_lot::RwLock::new(None),
        }
    }

    pub fn set_healthy(&self) {
        self.healthy.store(true, Ordering::Relaxed);
        *self.message.write() = None;
    }

    pub fn set_unhealthy(&self, msg: impl Into<String>) {
        self.healthy.store(false, Ordering::Relaxed);
        *self.message.write() = Some(msg.into());
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn message(&self) -> Option<String> {
        self.message.read().clone()
    }
}

/// Aggregated health status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealthReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealthReport {
    pub name: String,
    pub healthy: bool,
    pub message: Option<String>,
}

/// Global health registry.
///
/// Postgres is a fixed component; sources register at startup and flip with
/// the outcome of their latest run.
pub struct HealthRegistry {
    pub postgres: ComponentHealth,
    sources: parking_lot::RwLock<BTreeMap<String, SourceHealth>>,
}

#[derive(Debug, Clone)]
struct SourceHealth {
    healthy: bool,
    message: Option<String>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            postgres: ComponentHealth::new("postgres"),
            sources: parking_lot::RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a source. Sources are healthy until a run fails.
    pub fn register_source(&self, source_id: &str) {
        self.sources
            .write()
            .entry(source_id.to_string())
            .or_insert(SourceHealth {
                healthy: true,
                message: None,
            });
    }

    pub fn set_source_healthy(&self, source_id: &str) {
        self.sources.write().insert(
            source_id.to_string(),
            SourceHealth {
                healthy: true,
                message: None,
            },
        );
    }

    pub fn set_source_unhealthy(&self, source_id: &str, msg: impl Into<String>) {
        self.sources.write().insert(
            source_id.to_string(),
            SourceHealth {
                healthy: false,
                message: Some(msg.into()),
            },
        );
    }

    /// Generate a health report.
    ///
    /// Unhealthy postgres makes the whole service unhealthy; a failing source
    /// only degrades it.
    pub fn report(&self) -> HealthReport {
        let mut components = vec![ComponentHealthReport {
            name: self.postgres.name().to_string(),
            healthy: self.postgres.is_healthy(),
            message: self.postgres.message(),
        }];

        for (id, source) in self.sources.read().iter() {
            components.push(ComponentHealthReport {
                name: format!("source:{}", id),
                healthy: source.healthy,
                message: source.message.clone(),
            });
        }

        let status = if !self.postgres.is_healthy() {
            HealthStatus::Unhealthy
        } else if components.iter().all(|c| c.healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport { status, components }
    }

    /// Check if the service can do useful work.
    pub fn is_ready(&self) -> bool {
        self.postgres.is_healthy()
    }

    /// Check if the service is alive.
    pub fn is_alive(&self) -> bool {
        true // Service is running
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global health registry.
pub static HEALTH: std::sync::LazyLock<HealthRegistry> =
    std::sync::LazyLock::new(HealthRegistry::new);

/// Get the global health registry.
pub fn health() -> &'static HealthRegistry {
    &HEALTH
}
