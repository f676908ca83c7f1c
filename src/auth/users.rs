use rusqlite::{params, OptionalExtension};

use super::AuthError;
use crate::db::models::User;
use crate::state::DbPool;

/// Outcome of a sign-up. A taken name is an answer, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created(i64),
    Duplicate,
}

pub fn insert_user(
    pool: &DbPool,
    name: &str,
    password: &str,
    cost: u32,
) -> Result<Registration, AuthError> {
    let hashed = bcrypt::hash(password, cost)?;
    let conn = pool.get()?;

    match conn.execute(
        "INSERT INTO users (name, hashed) VALUES (?1, ?2)",
        params![name, hashed],
    ) {
        Ok(_) => {
            let uid = conn.last_insert_rowid();
            tracing::info!("Registered user {} ({})", name, uid);
            Ok(Registration::Created(uid))
        }
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            tracing::debug!("Registration refused, name taken: {}", name);
            Ok(Registration::Duplicate)
        }
        Err(e) => Err(e.into()),
    }
}

/// Check a name/password pair. `None` covers both unknown names and wrong passwords.
pub fn login_user(pool: &DbPool, name: &str, password: &str) -> Result<Option<User>, AuthError> {
    let conn = pool.get()?;
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT uid, hashed FROM users WHERE name = ?1",
            params![name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((uid, hashed)) = row else {
        return Ok(None);
    };

    if bcrypt::verify(password, &hashed)? {
        Ok(Some(User {
            uid,
            name: name.to_string(),
        }))
    } else {
        Ok(None)
    }
}
