//! Free food notifications shown on the home page.

use rusqlite::params;

use crate::db::models::FeastEvent;
use crate::error::AppResult;
use crate::state::DbPool;

pub const RECENT_FEASTS: usize = 3;

pub fn insert_feast(
    pool: &DbPool,
    owner: i64,
    description: &str,
    location: &str,
    time: &str,
) -> AppResult<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO notification (time, location, description, owner) VALUES (?1, ?2, ?3, ?4)",
        params![time, location, description, owner],
    )?;
    let nid = conn.last_insert_rowid();
    tracing::info!("User {} posted feast {} at {}", owner, nid, location);
    Ok(nid)
}

pub fn recent_feasts(pool: &DbPool, limit: usize) -> AppResult<Vec<FeastEvent>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT nid, time, location, description FROM notification
         ORDER BY nid DESC LIMIT ?1",
    )?;
    let feasts = stmt
        .query_map(params![limit as i64], |row| {
            Ok(FeastEvent {
                nid: row.get(0)?,
                time: row.get(1)?,
                location: row.get(2)?,
                description: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(feasts)
}
