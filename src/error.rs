use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::AuthError;
use crate::forum::ForumError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ForumError> for AppError {
    fn from(e: ForumError) -> Self {
        match e {
            ForumError::NotFound => AppError::NotFound,
            ForumError::WrongThread => {
                AppError::BadRequest("Message does not belong to this thread".into())
            }
            ForumError::TooDeep => AppError::BadRequest("Replies are nested too deeply".into()),
            ForumError::Database(e) => AppError::Database(e),
            ForumError::Pool(e) => AppError::Pool(e),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Database(e) => AppError::Database(e),
            AuthError::Pool(e) => AppError::Pool(e),
            AuthError::Hash(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                internal()
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                internal()
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                internal()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal()
            }
        };

        (status, Json(json!({ "ok": false, "message": message }))).into_response()
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

pub type AppResult<T> = Result<T, AppError>;
