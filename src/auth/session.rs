use axum::http::{header, HeaderMap};
use rand::Rng;
use rusqlite::{params, OptionalExtension};

use super::AuthError;
use crate::db::models::User;
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, uid: i64, hours: u64) -> Result<String, AuthError> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, uid, token, expires_at)
         VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, uid, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> Result<(), AuthError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// The user behind an unexpired session token.
pub fn user_for_token(pool: &DbPool, token: &str) -> Result<Option<User>, AuthError> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT u.uid, u.name FROM sessions s
             JOIN users u ON u.uid = s.uid
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| {
                Ok(User {
                    uid: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

pub fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        name,
        token,
        max_age_hours * 3600
    )
}

pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", name)
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .find_map(|cookie| {
            let (key, val) = cookie.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim())
        })
}

/// 32 random bytes, hex encoded.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
