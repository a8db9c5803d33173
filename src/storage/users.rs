use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{User, UserRow};

/// Inserts a fresh user row per §4.5: empty name, zeroed ban/rename state.
/// The caller sees `STATUS_RENAME` on their next authenticated action
/// because `display_name` starts empty.
pub async fn insert_user(pool: &PgPool, now: i64) -> AppResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users
            (display_name, display_color, auth_level, last_message,
             last_message_time, banned_at, banned_until,
             display_name_change_time, created_at)
        VALUES ('', '', 0, '', 0, 0, 0, 0, $1)
        RETURNING id
        "#,
    )
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

pub async fn get_user(pool: &PgPool, id: i64) -> AppResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(User::from))
}

pub async fn get_user_by_name(pool: &PgPool, display_name: &str) -> AppResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE display_name = $1")
        .bind(display_name)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(User::from))
}

pub async fn update_last_message(
    pool: &PgPool,
    id: i64,
    message: &str,
    time: i64,
) -> AppResult<()> {
    sqlx::query("UPDATE users SET last_message = $1, last_message_time = $2 WHERE id = $3")
        .bind(message)
        .bind(time)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Updates both the display name and color in one statement, as a
/// `setuserconf` frame always carries both — a collision surfaces as
/// `AppError::DuplicateKey` exactly like a bare rename.
pub async fn set_display_conf(
    pool: &PgPool,
    id: i64,
    display_name: &str,
    display_color: &str,
    now: i64,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE users SET display_name = $1, display_color = $2, display_name_change_time = $3 WHERE id = $4",
    )
    .bind(display_name)
    .bind(display_color)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await
    .map_err(AppError::from)?;

    Ok(())
}

/// Bans a user by display name. Refuses to touch ADMIN accounts — the
/// `WHERE auth_level != 100` clause enforces the invariant at the SQL
/// layer rather than trusting every caller to check first. Returns
/// whether a row was actually updated.
pub async fn ban_user(
    pool: &PgPool,
    display_name: &str,
    banned_at: i64,
    banned_until: i64,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE users SET banned_at = $1, banned_until = $2 WHERE display_name = $3 AND auth_level != 100",
    )
    .bind(banned_at)
    .bind(banned_until)
    .bind(display_name)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn unban_user(pool: &PgPool, display_name: &str) -> AppResult<bool> {
    let result = sqlx::query("UPDATE users SET banned_until = 0 WHERE display_name = $1")
        .bind(display_name)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Sets a user's auth level by display name, refusing ADMIN targets —
/// used by both `mod` and `unmod`.
pub async fn set_auth_level(pool: &PgPool, display_name: &str, level: i32) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE users SET auth_level = $1 WHERE display_name = $2 AND auth_level != 100",
    )
    .bind(level)
    .bind(display_name)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
