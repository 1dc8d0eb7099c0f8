//! PostgreSQL health checks.

use crate::schema::all_statements;
use harvest_core::{Error, Result};
use sqlx::PgPool;
use tracing::{debug, error};

/// Check PostgreSQL connection health.
pub async fn check_connection(pool: &PgPool) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => {
            debug!("PostgreSQL connection healthy");
            true
        }
        Err(e) => {
            error!("PostgreSQL health check failed: {}", e);
            false
        }
    }
}

/// Initialize database schema. Safe to run on every startup.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    for ddl in all_statements() {
        sqlx::query(&ddl)
            .execute(pool)
            .await
            .map_err(|e| Error::internal(format!("Failed to execute DDL: {}", e)))?;
    }

    debug!("PostgreSQL schema initialized");
    Ok(())
}
