/// Database layer for Session Surf Club
///
/// Owns the Postgres connection pool and the embedded migrations. Row types
/// shared by the managers live in [`models`].

pub mod models;

use crate::{
    config::DatabaseConfig,
    error::{SurfError, SurfResult},
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{error, info};

/// Create a PostgreSQL connection pool
pub async fn create_pool(config: &DatabaseConfig) -> SurfResult<PgPool> {
    info!("Connecting to PostgreSQL database...");
    info!("  Max connections: {}", config.max_connections);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .connect(&config.url)
        .await
        .map_err(|e| {
            error!("Failed to connect to PostgreSQL: {}", e);
            SurfError::Database(e)
        })?;

    info!("PostgreSQL connection established");

    Ok(pool)
}

/// Run migrations embedded from ./migrations/postgres
pub async fn run_migrations(pool: &PgPool) -> SurfResult<()> {
    info!("Running PostgreSQL migrations...");

    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .map_err(|e| {
            error!("Failed to run migrations: {}", e);
            SurfError::Internal(format!("Migration failed: {}", e))
        })?;

    info!("Migrations completed");

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &PgPool) -> SurfResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}
