use sqlx::PgPool;

use crate::error::AppResult;

pub async fn load_banned_words(pool: &PgPool) -> AppResult<Vec<String>> {
    let words: Vec<String> = sqlx::query_scalar("SELECT word FROM banned_words")
        .fetch_all(pool)
        .await?;
    Ok(words)
}

pub async fn is_host_banned(pool: &PgPool, host: &str, now: i64) -> AppResult<bool> {
    let hit: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM banned_hosts WHERE host = $1 AND until > $2 LIMIT 1",
    )
    .bind(host)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(hit.is_some())
}

pub async fn insert_banned_host(pool: &PgPool, host: &str, started: i64, until: i64) -> AppResult<()> {
    sqlx::query("INSERT INTO banned_hosts (host, started, until) VALUES ($1, $2, $3)")
        .bind(host)
        .bind(started)
        .bind(until)
        .execute(pool)
        .await?;

    Ok(())
}
