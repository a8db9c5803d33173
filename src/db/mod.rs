use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

use crate::error::{AppError, AppResult};

/// Builds the connection pool used by the chat loop. The spec models the
/// database as a single logical connection with auto-reconnect; a small
/// `sqlx` pool gives us that behavior for free while still reading as "one
/// handle" from the caller's perspective.
pub async fn create_pool(database_url: &str) -> AppResult<PgPool> {
    info!("connecting to database");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(|e| {
            tracing::error!("failed to connect to database: {:?}", e);
            AppError::Database(e)
        })?;

    info!("database connection pool created");
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::Config(format!("migration failed: {e}")))?;
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1").execute(pool).await.map_err(AppError::from)?;

    Ok(())
}
