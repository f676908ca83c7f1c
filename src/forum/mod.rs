//! DishDash: threads, reply trees and ownership-checked deletion.

pub mod delete;
pub mod store;
pub mod tree;

use std::fmt;

pub use self::delete::{delete_subtree, delete_thread_messages};
pub use self::store::ThreadStore;
pub use self::tree::{build_tree, MessageNode};

/// How many replies deep a message may sit below its top-level message. A
/// thread page nested this far still parses under serde_json's default
/// recursion limit.
pub const MAX_REPLY_DEPTH: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ForumError {
    #[error("Not found")]
    NotFound,

    #[error("Message does not belong to this thread")]
    WrongThread,

    #[error("Replies are nested too deeply")]
    TooDeep,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// What a delete request was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    Thread,
    Message,
    Comment,
    Picture,
}

impl fmt::Display for DeleteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeleteTarget::Thread => "thread",
            DeleteTarget::Message => "message",
            DeleteTarget::Comment => "comment",
            DeleteTarget::Picture => "picture",
        })
    }
}

/// Result of an ownership-checked delete. Refusals are values, not errors;
/// only storage failures come back as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(DeleteTarget),
    NotFound(DeleteTarget),
    Forbidden(DeleteTarget),
    /// The message exists but lives in another thread.
    WrongThread,
}

impl DeleteOutcome {
    pub fn ok(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted(_))
    }

    /// User-facing explanation for this outcome.
    pub fn reason(&self) -> &'static str {
        use DeleteOutcome::*;
        use DeleteTarget::*;

        match self {
            Deleted(Thread) => "Thread deleted.",
            Deleted(Message) => "Message and its replies have been deleted.",
            Deleted(Comment) => "Comment deleted.",
            Deleted(Picture) => "Picture deleted.",
            NotFound(Thread) => "Thread not found.",
            NotFound(Message) => "Message not found.",
            NotFound(Comment) => "Comment not found.",
            NotFound(Picture) => "Picture not found.",
            Forbidden(Thread) => "You can only delete threads you created.",
            Forbidden(Message) => "You can only delete your own messages.",
            Forbidden(Comment) => "You can only delete your own comments.",
            Forbidden(Picture) => "You can only delete your own pictures.",
            WrongThread => "Message does not belong to this thread.",
        }
    }
}
