use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::SimpleResponse;

/// All dynamically registered commands, loaded once at startup and kept in
/// the in-memory command registry from then on; these functions only run
/// again when `addcom`/`editcom`/`delcom` mutate the table.
pub async fn load_all(pool: &PgPool) -> AppResult<Vec<SimpleResponse>> {
    let rows = sqlx::query_as("SELECT * FROM responses").fetch_all(pool).await?;
    Ok(rows)
}

/// Fails with `AppError::DuplicateKey` if `command` is already registered.
pub async fn insert(pool: &PgPool, command: &str, response: &str) -> AppResult<()> {
    sqlx::query("INSERT INTO responses (command, response) VALUES ($1, $2)")
        .bind(command)
        .bind(response)
        .execute(pool)
        .await
        .map_err(AppError::from)?;

    Ok(())
}

/// Returns `true` if a row existed and was updated.
pub async fn update(pool: &PgPool, command: &str, response: &str) -> AppResult<bool> {
    let result = sqlx::query("UPDATE responses SET response = $1 WHERE command = $2")
        .bind(response)
        .bind(command)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &PgPool, command: &str) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM responses WHERE command = $1")
        .bind(command)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
