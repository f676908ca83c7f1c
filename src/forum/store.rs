use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::{
    delete_subtree, delete_thread_messages, DeleteOutcome, DeleteTarget, ForumError,
    MAX_REPLY_DEPTH,
};
use crate::db::models::{Thread, ThreadMessage, ThreadSummary};
use crate::state::DbPool;

/// Threads, their posts and messages. Every operation runs in one
/// transaction on one pooled connection.
#[derive(Clone)]
pub struct ThreadStore {
    db: DbPool,
}

impl ThreadStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Create a post and the thread wrapping it. Returns the thread id.
    pub fn create_thread(&self, owner: i64, description: &str) -> Result<i64, ForumError> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO post (owner, description) VALUES (?1, ?2)",
            params![owner, description],
        )?;
        let postid = tx.last_insert_rowid();

        tx.execute("INSERT INTO threads (postid) VALUES (?1)", params![postid])?;
        let thid = tx.last_insert_rowid();

        tx.commit()?;
        tracing::info!("User {} opened thread {}", owner, thid);
        Ok(thid)
    }

    /// All threads, newest first.
    pub fn list_threads(&self) -> Result<Vec<ThreadSummary>, ForumError> {
        let conn = self.db.get()?;
        let mut stmt = conn.prepare(
            "SELECT t.thid, p.postid, p.description, p.owner, u.name,
                    (SELECT COUNT(*) FROM messages m WHERE m.parentthread = t.thid)
             FROM threads t
             JOIN post p ON p.postid = t.postid
             LEFT JOIN users u ON u.uid = p.owner
             ORDER BY t.thid DESC",
        )?;

        let threads = stmt
            .query_map([], |row| {
                Ok(ThreadSummary {
                    thid: row.get(0)?,
                    postid: row.get(1)?,
                    description: row.get(2)?,
                    owner_id: row.get(3)?,
                    owner_name: row.get(4)?,
                    message_count: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(threads)
    }

    pub fn get_thread(&self, thid: i64) -> Result<Option<Thread>, ForumError> {
        let conn = self.db.get()?;
        let thread = conn
            .query_row(
                "SELECT t.thid, p.postid, p.description, p.owner, u.name
                 FROM threads t
                 JOIN post p ON p.postid = t.postid
                 LEFT JOIN users u ON u.uid = p.owner
                 WHERE t.thid = ?1",
                params![thid],
                |row| {
                    Ok(Thread {
                        thid: row.get(0)?,
                        postid: row.get(1)?,
                        description: row.get(2)?,
                        owner_id: row.get(3)?,
                        owner_name: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(thread)
    }

    /// A thread's messages, flat, in the order they were sent.
    pub fn thread_messages(&self, thid: i64) -> Result<Vec<ThreadMessage>, ForumError> {
        let conn = self.db.get()?;
        let mut stmt = conn.prepare(
            "SELECT m.mid, m.replyto, m.sender, u.name, m.content, m.parentthread, m.sent_at
             FROM messages m
             LEFT JOIN users u ON u.uid = m.sender
             WHERE m.parentthread = ?1
             ORDER BY m.sent_at, m.mid",
        )?;

        let messages = stmt
            .query_map(params![thid], message_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Post a message, optionally as a reply. The thread must exist and a
    /// reply must answer a message in the same thread, no deeper than
    /// `MAX_REPLY_DEPTH` below its top-level message.
    pub fn insert_message(
        &self,
        sender: i64,
        thid: i64,
        content: &str,
        reply_to: Option<i64>,
    ) -> Result<i64, ForumError> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction()?;

        let thread_exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM threads WHERE thid = ?1",
            params![thid],
            |row| row.get(0),
        )?;
        if !thread_exists {
            return Err(ForumError::NotFound);
        }

        if let Some(parent) = reply_to {
            let parent_thread: Option<i64> = tx
                .query_row(
                    "SELECT parentthread FROM messages WHERE mid = ?1",
                    params![parent],
                    |row| row.get(0),
                )
                .optional()?;
            match parent_thread {
                None => return Err(ForumError::NotFound),
                Some(t) if t != thid => return Err(ForumError::WrongThread),
                Some(_) => {}
            }
            if reply_depth(&tx, parent)? >= MAX_REPLY_DEPTH {
                return Err(ForumError::TooDeep);
            }
        }

        tx.execute(
            "INSERT INTO messages (replyto, sender, content, parentthread)
             VALUES (?1, ?2, ?3, ?4)",
            params![reply_to, sender, content, thid],
        )?;
        let mid = tx.last_insert_rowid();

        tx.commit()?;
        tracing::debug!("Message {} posted to thread {}", mid, thid);
        Ok(mid)
    }

    /// Delete a thread, its whole message forest and its post.
    ///
    /// The immediate transaction takes the write lock before the owner check,
    /// so a second concurrent delete waits and then finds nothing.
    pub fn delete_thread(&self, requester: i64, thid: i64) -> Result<DeleteOutcome, ForumError> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let found: Option<(i64, i64)> = tx
            .query_row(
                "SELECT p.postid, p.owner FROM threads t
                 JOIN post p ON p.postid = t.postid
                 WHERE t.thid = ?1",
                params![thid],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let outcome = match found {
            None => DeleteOutcome::NotFound(DeleteTarget::Thread),
            Some((_, owner)) if owner != requester => {
                DeleteOutcome::Forbidden(DeleteTarget::Thread)
            }
            Some((postid, _)) => {
                let messages = delete_thread_messages(&tx, thid)?;
                tx.execute("DELETE FROM threads WHERE thid = ?1", params![thid])?;
                tx.execute("DELETE FROM post WHERE postid = ?1", params![postid])?;
                tx.commit()?;
                tracing::info!(
                    "User {} deleted thread {} ({} messages)",
                    requester,
                    thid,
                    messages
                );
                return Ok(DeleteOutcome::Deleted(DeleteTarget::Thread));
            }
        };

        tracing::info!("User {} could not delete thread {}: {:?}", requester, thid, outcome);
        Ok(outcome)
    }

    /// Delete a message and every reply beneath it.
    pub fn delete_message(
        &self,
        requester: i64,
        thid: i64,
        mid: i64,
    ) -> Result<DeleteOutcome, ForumError> {
        let mut conn = self.db.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let found: Option<(i64, i64)> = tx
            .query_row(
                "SELECT parentthread, sender FROM messages WHERE mid = ?1",
                params![mid],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let outcome = match found {
            None => DeleteOutcome::NotFound(DeleteTarget::Message),
            Some((thread, _)) if thread != thid => DeleteOutcome::WrongThread,
            Some((_, sender)) if sender != requester => {
                DeleteOutcome::Forbidden(DeleteTarget::Message)
            }
            Some(_) => {
                let removed = delete_subtree(&tx, mid)?;
                tx.commit()?;
                tracing::info!(
                    "User {} deleted message {} in thread {} ({} rows)",
                    requester,
                    mid,
                    thid,
                    removed
                );
                return Ok(DeleteOutcome::Deleted(DeleteTarget::Message));
            }
        };

        tracing::info!(
            "User {} could not delete message {} in thread {}: {:?}",
            requester,
            mid,
            thid,
            outcome
        );
        Ok(outcome)
    }
}

/// Replies above `mid`, counted up to one past the limit so a cyclic chain
/// still ends.
fn reply_depth(conn: &Connection, mid: i64) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached("SELECT replyto FROM messages WHERE mid = ?1")?;
    let mut depth = 0;
    let mut current = mid;

    while depth <= MAX_REPLY_DEPTH {
        let parent: Option<i64> = stmt
            .query_row(params![current], |row| row.get(0))
            .optional()?
            .flatten();
        match parent {
            Some(p) => {
                depth += 1;
                current = p;
            }
            None => break,
        }
    }
    Ok(depth)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ThreadMessage> {
    Ok(ThreadMessage {
        mid: row.get(0)?,
        reply_to: row.get(1)?,
        sender: row.get(2)?,
        sender_name: row.get(3)?,
        content: row.get(4)?,
        thread_id: row.get(5)?,
        sent_at: row.get(6)?,
    })
}
