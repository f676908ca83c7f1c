use std::collections::HashSet;

use rusqlite::{params, Connection};

/// Delete message `mid` and every reply beneath it.
///
/// Call inside an open transaction. `messages.replyto` references its parent
/// without a cascade, so replies are deleted before the message they answer.
/// The walk uses an explicit stack; reply chains of any depth are fine.
/// Returns the number of rows removed.
pub fn delete_subtree(conn: &Connection, mid: i64) -> rusqlite::Result<usize> {
    let mut replies = conn.prepare_cached("SELECT mid FROM messages WHERE replyto = ?1")?;

    // Pre-order walk: every reply lands after its parent.
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![mid];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        order.push(id);
        let children = replies
            .query_map(params![id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        stack.extend(children);
    }

    let mut delete = conn.prepare_cached("DELETE FROM messages WHERE mid = ?1")?;
    let mut deleted = 0;
    for id in order.into_iter().rev() {
        deleted += delete.execute(params![id])?;
    }

    Ok(deleted)
}

/// Delete every message in a thread. Same transaction rules as [`delete_subtree`].
pub fn delete_thread_messages(conn: &Connection, thid: i64) -> rusqlite::Result<usize> {
    let mids = conn
        .prepare("SELECT mid FROM messages WHERE parentthread = ?1 ORDER BY mid")?
        .query_map(params![thid], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut deleted = 0;
    for mid in mids {
        // Replies of earlier roots are already gone; those deletes are no-ops.
        deleted += delete_subtree(conn, mid)?;
    }
    Ok(deleted)
}
