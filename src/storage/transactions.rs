use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::Transaction;

/// Records a checked donation order. `order_id` is unique, so replaying the
/// same webhook/redirect twice surfaces as `AppError::DuplicateKey` rather
/// than double-crediting the donation.
pub async fn insert(
    pool: &PgPool,
    order_id: &str,
    user_id: i64,
    time_received: i64,
    data: &serde_json::Value,
    message: &str,
    succeeded: bool,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (order_id, user_id, time_received, data, message, succeeded)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(order_id)
    .bind(user_id)
    .bind(time_received)
    .bind(data)
    .bind(message)
    .bind(succeeded)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn already_recorded(pool: &PgPool, order_id: &str) -> AppResult<bool> {
    let hit: Option<i32> = sqlx::query_scalar("SELECT 1 FROM transactions WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?;

    Ok(hit.is_some())
}

pub async fn get(pool: &PgPool, order_id: &str) -> AppResult<Option<Transaction>> {
    let row: Option<Transaction> = sqlx::query_as("SELECT * FROM transactions WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}
