use sqlx::PgPool;

use crate::error::AppResult;

/// Deletes expired cache rows before every lookup, matching the donor
/// algorithm's "expire rows where expiry < now" step.
pub async fn expire_tokens(pool: &PgPool, now: i64) -> AppResult<()> {
    sqlx::query("DELETE FROM google_ids WHERE expiry < $1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}

/// Returns `(sub, expiry)` for a cached id-token, if present.
pub async fn lookup_token(pool: &PgPool, id_token: &str) -> AppResult<Option<(String, i64)>> {
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT sub, expiry FROM google_ids WHERE id_token = $1")
            .bind(id_token)
            .fetch_optional(pool)
            .await?;
    Ok(row)
}

pub async fn cache_token(pool: &PgPool, id_token: &str, sub: &str, expiry: i64) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO google_ids (id_token, sub, expiry) VALUES ($1, $2, $3)
        ON CONFLICT (id_token) DO UPDATE SET sub = EXCLUDED.sub, expiry = EXCLUDED.expiry
        "#,
    )
    .bind(id_token)
    .bind(sub)
    .bind(expiry)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn lookup_user_by_sub(pool: &PgPool, sub: &str) -> AppResult<Option<i64>> {
    let user_id: Option<i64> =
        sqlx::query_scalar("SELECT user_id FROM google_users WHERE sub = $1")
            .bind(sub)
            .fetch_optional(pool)
            .await?;
    Ok(user_id)
}

pub async fn link_user(pool: &PgPool, sub: &str, user_id: i64) -> AppResult<()> {
    sqlx::query("INSERT INTO google_users (sub, user_id) VALUES ($1, $2)")
        .bind(sub)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
