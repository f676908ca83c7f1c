use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{insert_user, login_user, session, Registration};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct JoinForm {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// POST /join: create an account and sign it in.
pub async fn join(
    State(state): State<AppState>,
    Form(form): Form<JoinForm>,
) -> AppResult<Response> {
    let username = form.username.trim();
    if username.is_empty() || form.password1.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password are required".into(),
        ));
    }
    if form.password1 != form.password2 {
        return Err(AppError::BadRequest("Passwords do not match".into()));
    }

    let uid = match insert_user(
        &state.db,
        username,
        &form.password1,
        state.config.auth.bcrypt_cost,
    )? {
        Registration::Created(uid) => uid,
        Registration::Duplicate => {
            return Err(AppError::Conflict("Username already exists".into()));
        }
    };

    signed_in(&state, uid, username)
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let user = login_user(&state.db, form.username.trim(), &form.password)?
        .ok_or(AppError::Unauthorized)?;
    tracing::info!("User {} logged in", user.uid);
    signed_in(&state, user.uid, &user.name)
}

/// POST /logout: drop the session if there is one.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = session::cookie_value(&headers, cookie_name) {
        if let Err(e) = session::delete_session(&state.db, token) {
            tracing::warn!("Failed to delete session on logout: {}", e);
        }
    }

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session::clear_session_cookie(cookie_name))],
        Json(json!({ "ok": true })),
    )
        .into_response())
}

fn signed_in(state: &AppState, uid: i64, name: &str) -> AppResult<Response> {
    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.db, uid, hours)?;
    let cookie = session::session_cookie(&state.config.auth.cookie_name, &token, hours);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "uid": uid, "name": name })),
    )
        .into_response())
}
