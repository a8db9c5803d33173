use sqlx::PgPool;

use crate::error::AppResult;

/// The `config` table is a flat name→value store for the handful of
/// settings commands mutate at runtime (currently just `video`, per the
/// `video <id>` command). Upserts so repeated calls don't error.
pub async fn set_config(pool: &PgPool, name: &str, value: &str) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO config (name, value) VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value
        "#,
    )
    .bind(name)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_config(pool: &PgPool, name: &str) -> AppResult<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM config WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(value)
}
