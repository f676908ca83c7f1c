pub mod auth;
pub mod dishes;
pub mod forum;
pub mod home;
pub mod uploads;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum::Router;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::forum::DeleteOutcome;
use crate::state::AppState;

/// The whole HTTP surface.
pub fn router(state: AppState) -> Router {
    // Multipart framing needs a little room on top of the file itself.
    let body_limit = state.config.storage.max_upload_bytes + 64 * 1024;

    Router::new()
        .merge(auth::router())
        .merge(home::router())
        .merge(forum::router())
        .merge(dishes::router())
        .merge(uploads::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Render a delete outcome as `{ ok, message }` with a matching status.
pub fn outcome_response(outcome: DeleteOutcome) -> Response {
    let status = match outcome {
        DeleteOutcome::Deleted(_) => StatusCode::OK,
        DeleteOutcome::NotFound(_) => StatusCode::NOT_FOUND,
        DeleteOutcome::Forbidden(_) => StatusCode::FORBIDDEN,
        DeleteOutcome::WrongThread => StatusCode::BAD_REQUEST,
    };

    (
        status,
        Json(json!({ "ok": outcome.ok(), "message": outcome.reason() })),
    )
        .into_response()
}
