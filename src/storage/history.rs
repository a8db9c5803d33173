use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::Message;

/// Persists one chat line (or bot message). Always inserted, even when
/// `dropped` is true — soft-deleted messages stay in storage, they're just
/// excluded from replay and broadcast.
#[allow(clippy::too_many_arguments)]
pub async fn insert_message(
    pool: &PgPool,
    user_id: i64,
    time: i64,
    message: &str,
    dropped: bool,
    host: &str,
    donate_value: &str,
) -> AppResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO history (user_id, time, message, dropped, host, donate_value)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(time)
    .bind(message)
    .bind(dropped)
    .bind(host)
    .bind(donate_value)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// The most recent non-dropped messages, oldest first, for the history
/// burst sent on `hello`.
pub async fn recent_history(pool: &PgPool, limit: i64) -> AppResult<Vec<Message>> {
    let mut rows: Vec<Message> = sqlx::query_as(
        "SELECT * FROM history WHERE dropped = FALSE ORDER BY id DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.reverse();
    Ok(rows)
}

/// Soft-deletes every undropped message belonging to `user_id` (used by the
/// ban algorithm) and returns the ids that were actually flipped, so the
/// caller can broadcast a `delete` frame for exactly those ids.
pub async fn soft_delete_user_messages(pool: &PgPool, user_id: i64) -> AppResult<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "UPDATE history SET dropped = TRUE WHERE user_id = $1 AND dropped = FALSE RETURNING id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Soft-deletes the given message ids directly (`delete`/`del`/`rm`
/// command). Unlike the ban path, this updates by id regardless of current
/// `dropped` state — re-deleting an already-dropped id is harmless.
pub async fn soft_delete_messages(pool: &PgPool, ids: &[i64]) -> AppResult<()> {
    for id in ids {
        sqlx::query("UPDATE history SET dropped = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
    }

    Ok(())
}
