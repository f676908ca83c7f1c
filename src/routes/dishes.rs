use axum::extract::{Multipart, Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::outcome_response;
use crate::db::models::{Dish, DishComment, DishPicture};
use crate::dishes::{self, DEFAULT_COMMENT_TYPE};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dish/{did}", get(show))
        .route("/dish/{did}/comments", post(add_comment))
        .route("/dish/{did}/pictures", post(upload_picture))
        .route("/dish/{did}/delete_pic/{pid}", post(delete_picture))
        .route("/dish/{did}/delete_comment/{commentid}", post(delete_comment))
}

#[derive(Serialize)]
pub struct DishPage {
    pub dish: Dish,
    pub comments: Vec<DishComment>,
    pub pictures: Vec<DishPicture>,
}

#[derive(Deserialize)]
pub struct CommentForm {
    pub comment: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

pub async fn show(
    State(state): State<AppState>,
    Path(did): Path<i64>,
) -> AppResult<Json<DishPage>> {
    let dish = dishes::get_dish(&state.db, did)?.ok_or(AppError::NotFound)?;
    Ok(Json(DishPage {
        dish,
        comments: dishes::comments(&state.db, did)?,
        pictures: dishes::pictures(&state.db, did)?,
    }))
}

pub async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(did): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Json<Value>> {
    let comment = form.comment.trim();
    if comment.is_empty() {
        return Err(AppError::BadRequest("Comment is required".into()));
    }
    let kind = form
        .kind
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or(DEFAULT_COMMENT_TYPE);

    dishes::get_dish(&state.db, did)?.ok_or(AppError::NotFound)?;
    let commentid = dishes::add_comment(&state.db, did, user.uid, kind, comment)?;
    Ok(Json(json!({ "ok": true, "commentid": commentid })))
}

/// POST /dish/{did}/pictures, multipart field `picture`.
pub async fn upload_picture(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(did): Path<i64>,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    dishes::get_dish(&state.db, did)?.ok_or(AppError::NotFound)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("picture") {
            continue;
        }

        let original = field.file_name().unwrap_or_default().to_string();
        let filename = dishes::stored_filename(did, &original).ok_or_else(|| {
            AppError::BadRequest("Only png, jpg, jpeg and gif files are allowed".into())
        })?;
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if data.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".into()));
        }

        let dir = state.config.uploads_path();
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&filename), &data).await?;

        let pid = dishes::add_picture(&state.db, did, user.uid, &filename)?;
        tracing::info!("User {} uploaded {} for dish {}", user.uid, filename, did);
        return Ok(Json(json!({ "ok": true, "pid": pid, "filename": filename })));
    }

    Err(AppError::BadRequest("No picture in upload".into()))
}

pub async fn delete_picture(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((did, pid)): Path<(i64, i64)>,
) -> AppResult<Response> {
    let (outcome, orphan) = dishes::delete_picture(&state.db, user.uid, did, pid)?;

    if let Some(filename) = orphan {
        let path = state.config.uploads_path().join(&filename);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("Could not remove {}: {}", path.display(), e);
        }
    }

    Ok(outcome_response(outcome))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((did, commentid)): Path<(i64, i64)>,
) -> AppResult<Response> {
    let outcome = dishes::delete_comment(&state.db, user.uid, did, commentid)?;
    Ok(outcome_response(outcome))
}
