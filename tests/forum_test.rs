//! DishDash thread store against a real SQLite file.

use std::sync::{Arc, Barrier};

use rusqlite::params;
use tempfile::TempDir;
use wfresh::db;
use wfresh::forum::{
    build_tree, delete_subtree, DeleteOutcome, DeleteTarget, ForumError, ThreadStore,
    MAX_REPLY_DEPTH,
};
use wfresh::state::DbPool;

fn setup() -> (TempDir, DbPool, ThreadStore) {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::create_pool(&temp_dir.path().join("forum.db")).expect("create pool");
    db::run_migrations(&pool).expect("run migrations");
    pool.get()
        .unwrap()
        .execute_batch(
            "INSERT INTO users (uid, name, hashed) VALUES (1, 'ada', 'x');
             INSERT INTO users (uid, name, hashed) VALUES (2, 'bo', 'y');",
        )
        .unwrap();
    let store = ThreadStore::new(pool.clone());
    (temp_dir, pool, store)
}

fn count(pool: &DbPool, table: &str) -> i64 {
    pool.get()
        .unwrap()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
        .unwrap()
}

#[test]
fn create_thread_then_list_newest_first() {
    let (_tmp, _pool, store) = setup();
    let first = store.create_thread(1, "Where is the best soup?").unwrap();
    let second = store.create_thread(2, "Tower brunch?").unwrap();
    store.insert_message(1, first, "Lulu", None).unwrap();

    let threads = store.list_threads().unwrap();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0].thid, second);
    assert_eq!(threads[0].owner_name.as_deref(), Some("bo"));
    assert_eq!(threads[0].message_count, 0);
    assert_eq!(threads[1].thid, first);
    assert_eq!(threads[1].message_count, 1);

    let thread = store.get_thread(first).unwrap().unwrap();
    assert_eq!(thread.owner_id, 1);
    assert_eq!(thread.description, "Where is the best soup?");
    assert!(store.get_thread(999).unwrap().is_none());
}

#[test]
fn create_thread_with_unknown_owner_leaves_no_post() {
    let (_tmp, pool, store) = setup();
    assert!(store.create_thread(42, "ghost").is_err());
    assert_eq!(count(&pool, "post"), 0);
    assert_eq!(count(&pool, "threads"), 0);
}

#[test]
fn messages_come_back_in_send_order_and_nest() {
    let (_tmp, _pool, store) = setup();
    let thid = store.create_thread(1, "Best dessert").unwrap();
    let root = store.insert_message(1, thid, "Cookies", None).unwrap();
    let reply = store.insert_message(2, thid, "Agreed", Some(root)).unwrap();
    let other = store.insert_message(2, thid, "Pie", None).unwrap();

    let messages = store.thread_messages(thid).unwrap();
    let mids: Vec<i64> = messages.iter().map(|m| m.mid).collect();
    assert_eq!(mids, vec![root, reply, other]);
    assert_eq!(messages[1].sender_name.as_deref(), Some("bo"));

    let forest = build_tree(&messages);
    assert_eq!(forest.len(), 2);
    assert_eq!(forest[0].children[0].message.mid, reply);
}

#[test]
fn insert_message_checks_thread_and_parent() {
    let (_tmp, _pool, store) = setup();
    let a = store.create_thread(1, "A").unwrap();
    let b = store.create_thread(1, "B").unwrap();
    let in_a = store.insert_message(1, a, "hello", None).unwrap();

    assert!(matches!(
        store.insert_message(1, 999, "lost", None),
        Err(ForumError::NotFound)
    ));
    assert!(matches!(
        store.insert_message(1, b, "cross", Some(in_a)),
        Err(ForumError::WrongThread)
    ));
    assert!(matches!(
        store.insert_message(1, a, "dangling", Some(999)),
        Err(ForumError::NotFound)
    ));
}

#[test]
fn delete_subtree_removes_two_children_and_a_grandchild() {
    let (_tmp, pool, store) = setup();
    let thid = store.create_thread(1, "tree").unwrap();
    let root = store.insert_message(1, thid, "root", None).unwrap();
    let left = store.insert_message(2, thid, "left", Some(root)).unwrap();
    store.insert_message(2, thid, "right", Some(root)).unwrap();
    store.insert_message(1, thid, "grandchild", Some(left)).unwrap();
    let bystander = store.insert_message(1, thid, "unrelated", None).unwrap();

    let mut conn = pool.get().unwrap();
    let tx = conn.transaction().unwrap();
    assert_eq!(delete_subtree(&tx, root).unwrap(), 4);
    tx.commit().unwrap();

    let orphans: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM messages WHERE replyto = ?1",
            params![root],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);

    let left_over: Vec<i64> = store
        .thread_messages(thid)
        .unwrap()
        .iter()
        .map(|m| m.mid)
        .collect();
    assert_eq!(left_over, vec![bystander]);
}

#[test]
fn delete_thread_by_non_owner_is_forbidden_and_changes_nothing() {
    let (_tmp, pool, store) = setup();
    let thid = store.create_thread(1, "mine").unwrap();
    let root = store.insert_message(1, thid, "first", None).unwrap();
    store.insert_message(2, thid, "reply", Some(root)).unwrap();

    let outcome = store.delete_thread(2, thid).unwrap();
    assert_eq!(outcome, DeleteOutcome::Forbidden(DeleteTarget::Thread));
    assert!(!outcome.ok());

    assert_eq!(count(&pool, "threads"), 1);
    assert_eq!(count(&pool, "post"), 1);
    assert_eq!(count(&pool, "messages"), 2);
}

#[test]
fn delete_thread_by_owner_removes_thread_post_and_messages() {
    let (_tmp, pool, store) = setup();
    let thid = store.create_thread(1, "mine").unwrap();
    let keep = store.create_thread(2, "theirs").unwrap();
    let root = store.insert_message(1, thid, "first", None).unwrap();
    let reply = store.insert_message(2, thid, "reply", Some(root)).unwrap();
    store.insert_message(1, thid, "deeper", Some(reply)).unwrap();
    store.insert_message(1, keep, "elsewhere", None).unwrap();

    assert_eq!(
        store.delete_thread(1, thid).unwrap(),
        DeleteOutcome::Deleted(DeleteTarget::Thread)
    );
    assert!(store.get_thread(thid).unwrap().is_none());
    assert_eq!(count(&pool, "post"), 1);
    assert_eq!(count(&pool, "messages"), 1);

    assert_eq!(
        store.delete_thread(1, thid).unwrap(),
        DeleteOutcome::NotFound(DeleteTarget::Thread)
    );
}

#[test]
fn delete_message_from_another_thread_is_wrong_thread() {
    let (_tmp, pool, store) = setup();
    let a = store.create_thread(1, "A").unwrap();
    let b = store.create_thread(1, "B").unwrap();
    let in_a = store.insert_message(1, a, "hello", None).unwrap();

    let outcome = store.delete_message(1, b, in_a).unwrap();
    assert_eq!(outcome, DeleteOutcome::WrongThread);
    assert_eq!(outcome.reason(), "Message does not belong to this thread.");
    assert_eq!(count(&pool, "messages"), 1);
}

#[test]
fn delete_message_checks_sender_then_removes_replies() {
    let (_tmp, pool, store) = setup();
    let thid = store.create_thread(1, "t").unwrap();
    let root = store.insert_message(1, thid, "root", None).unwrap();
    store.insert_message(2, thid, "reply", Some(root)).unwrap();

    assert_eq!(
        store.delete_message(2, thid, root).unwrap(),
        DeleteOutcome::Forbidden(DeleteTarget::Message)
    );
    assert_eq!(
        store.delete_message(1, thid, 999).unwrap(),
        DeleteOutcome::NotFound(DeleteTarget::Message)
    );
    assert_eq!(
        store.delete_message(1, thid, root).unwrap(),
        DeleteOutcome::Deleted(DeleteTarget::Message)
    );
    assert_eq!(count(&pool, "messages"), 0);
}

#[test]
fn concurrent_deletes_of_one_thread_succeed_once() {
    let (_tmp, pool, store) = setup();
    let thid = store.create_thread(1, "race").unwrap();
    let mut parent = None;
    for i in 0..20 {
        parent = Some(store.insert_message(1, thid, &format!("m{i}"), parent).unwrap());
    }

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                store.delete_thread(1, thid).unwrap()
            })
        })
        .collect();
    let outcomes: Vec<DeleteOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|o| o.ok()).count(), 1);
    assert!(outcomes.contains(&DeleteOutcome::NotFound(DeleteTarget::Thread)));
    assert_eq!(count(&pool, "messages"), 0);
    assert_eq!(count(&pool, "post"), 0);
}

#[test]
fn concurrent_deletes_of_one_message_succeed_once() {
    let (_tmp, pool, store) = setup();
    let thid = store.create_thread(1, "race").unwrap();
    let root = store.insert_message(1, thid, "root", None).unwrap();
    let mut parent = root;
    for i in 0..10 {
        let reply = store.insert_message(2, thid, &format!("r{i}"), Some(parent)).unwrap();
        store.insert_message(1, thid, &format!("s{i}"), Some(reply)).unwrap();
        parent = reply;
    }
    let other = store.insert_message(2, thid, "other", None).unwrap();
    let other_reply = store.insert_message(1, thid, "other reply", Some(other)).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                store.delete_message(1, thid, root).unwrap()
            })
        })
        .collect();
    let mut outcomes: Vec<DeleteOutcome> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    outcomes.sort_by_key(|o| !o.ok());

    assert_eq!(
        outcomes,
        vec![
            DeleteOutcome::Deleted(DeleteTarget::Message),
            DeleteOutcome::NotFound(DeleteTarget::Message),
        ]
    );
    let left: Vec<i64> = store
        .thread_messages(thid)
        .unwrap()
        .iter()
        .map(|m| m.mid)
        .collect();
    assert_eq!(left, vec![other, other_reply]);
    assert_eq!(count(&pool, "messages"), 2);
}

#[test]
fn replies_stop_at_the_depth_limit() {
    let (_tmp, _pool, store) = setup();
    let thid = store.create_thread(1, "deep").unwrap();
    let root = store.insert_message(1, thid, "root", None).unwrap();
    let mut chain = vec![root];
    for i in 0..MAX_REPLY_DEPTH {
        let parent = chain.last().copied();
        chain.push(store.insert_message(1, thid, &format!("r{i}"), parent).unwrap());
    }

    let deepest = chain.last().copied();
    assert!(matches!(
        store.insert_message(1, thid, "one too many", deepest),
        Err(ForumError::TooDeep)
    ));
    // A sibling further up is still fine.
    let shallower = Some(chain[MAX_REPLY_DEPTH - 1]);
    store.insert_message(2, thid, "sideways", shallower).unwrap();

    let messages = store.thread_messages(thid).unwrap();
    assert_eq!(messages.len(), MAX_REPLY_DEPTH + 2);
    let forest = build_tree(&messages);
    assert_eq!(forest.len(), 1);
    assert!(serde_json::to_string(&forest).is_ok());
}
