use std::io::ErrorKind;
use std::path::Component;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/uploads/{*path}", get(serve))
}

/// GET /uploads/{*path}: a stored dish picture.
pub async fn serve(State(state): State<AppState>, Path(path): Path<String>) -> AppResult<Response> {
    let relative = std::path::Path::new(&path);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(AppError::NotFound);
    }

    let data = match tokio::fs::read(state.config.uploads_path().join(relative)).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(e) => return Err(e.into()),
    };

    let mime = mime_guess::from_path(relative).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        data,
    )
        .into_response())
}
