use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::outcome_response;
use crate::db::models::{Thread, ThreadSummary};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forum::{build_tree, MessageNode};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dishdash", get(list).post(create))
        .route("/dishdash/thread/{thid}", get(show).post(reply))
        .route("/dishdash/thread/{thid}/delete_thread", post(delete_thread))
        .route("/dishdash/thread/{thid}/delete/{mid}", post(delete_message))
}

#[derive(Deserialize)]
pub struct ThreadForm {
    pub description: String,
}

#[derive(Deserialize)]
pub struct ReplyForm {
    pub content: String,
    /// Empty when posting at the top level.
    pub replyto: Option<String>,
}

#[derive(Serialize)]
pub struct ThreadPage {
    pub thread: Thread,
    pub messages: Vec<MessageNode>,
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<ThreadSummary>>> {
    Ok(Json(state.threads.list_threads()?))
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<ThreadForm>,
) -> AppResult<Json<Value>> {
    let description = form.description.trim();
    if description.is_empty() {
        return Err(AppError::BadRequest("Description is required".into()));
    }

    let thid = state.threads.create_thread(user.uid, description)?;
    Ok(Json(json!({ "ok": true, "thid": thid })))
}

pub async fn show(
    State(state): State<AppState>,
    Path(thid): Path<i64>,
) -> AppResult<Json<ThreadPage>> {
    let thread = state.threads.get_thread(thid)?.ok_or(AppError::NotFound)?;
    let messages = state.threads.thread_messages(thid)?;

    Ok(Json(ThreadPage {
        thread,
        messages: build_tree(&messages),
    }))
}

pub async fn reply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(thid): Path<i64>,
    Form(form): Form<ReplyForm>,
) -> AppResult<Json<Value>> {
    let content = form.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Message content is required".into()));
    }
    let reply_to = parse_reply_to(form.replyto.as_deref())?;

    let mid = state
        .threads
        .insert_message(user.uid, thid, content, reply_to)?;
    Ok(Json(json!({ "ok": true, "mid": mid })))
}

pub async fn delete_thread(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(thid): Path<i64>,
) -> AppResult<Response> {
    let outcome = state.threads.delete_thread(user.uid, thid)?;
    Ok(outcome_response(outcome))
}

pub async fn delete_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((thid, mid)): Path<(i64, i64)>,
) -> AppResult<Response> {
    let outcome = state.threads.delete_message(user.uid, thid, mid)?;
    Ok(outcome_response(outcome))
}

fn parse_reply_to(raw: Option<&str>) -> AppResult<Option<i64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest("replyto must be a message id".into())),
    }
}
