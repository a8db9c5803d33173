use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// A unique-constraint violation (display name rename collision, donation
    /// order replay). Distinguished from `Database` so callers can map it to
    /// a specific wire status instead of a generic failure.
    #[error("duplicate key")]
    DuplicateKey,

    #[error("config error: {0}")]
    Config(String),

    #[error("upstream http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal server error")]
    Internal,
}

/// SQLSTATE for a Postgres unique-violation. The original implementation
/// targets MySQL and checks native error 1062; this crate targets Postgres
/// (per the donor's sqlx feature set) so the equivalent check is 23505.
const PG_UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) {
                return AppError::DuplicateKey;
            }
        }
        AppError::Database(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message): (StatusCode, String) = match self {
            AppError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
            AppError::DuplicateKey => (StatusCode::CONFLICT, "Resource already exists".into()),
            AppError::Config(msg) => {
                tracing::error!("config error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
            AppError::Http(e) => {
                tracing::error!("upstream http error: {:?}", e);
                (StatusCode::BAD_GATEWAY, "Upstream request failed".into())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal => {
                tracing::error!("internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_key_returns_409() {
        let response = AppError::DuplicateKey.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn validation_error_returns_400() {
        let response = AppError::Validation("invalid input".into()).into_response();
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn internal_error_returns_500() {
        let response = AppError::Internal.into_response();
        assert_eq!(
            response.status(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn database_row_not_found_returns_500() {
        let response = AppError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(
            response.status(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unique_violation_maps_to_duplicate_key() {
        // sqlx::Error::Database wraps a trait object we can't easily construct
        // by hand outside of a real driver round-trip; the code-matching
        // logic itself is exercised end-to-end by the rename/donation
        // integration tests instead.
        let err = AppError::DuplicateKey;
        assert!(matches!(err, AppError::DuplicateKey));
    }
}
