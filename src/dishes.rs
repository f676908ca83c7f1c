//! Dish pages: the dish catalogue, comments and uploaded pictures.

use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::db::models::{Dish, DishComment, DishPicture};
use crate::error::AppResult;
use crate::forum::{DeleteOutcome, DeleteTarget};
use crate::menu;
use crate::state::DbPool;

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

pub const DEFAULT_COMMENT_TYPE: &str = "yum";

pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Name an upload is stored under, or `None` if it is not an image we accept.
///
/// Directory parts are dropped and anything outside `[A-Za-z0-9._-]` becomes
/// `_`, so the result never escapes the uploads directory.
pub fn stored_filename(did: i64, original: &str) -> Option<String> {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let clean: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let clean = clean.trim_start_matches('.');

    if clean.is_empty() || !allowed_file(clean) {
        return None;
    }
    Some(format!("dish{}_{}", did, clean))
}

/// Remember every dish the provider served so dish pages resolve. Existing
/// rows are left alone. Returns how many were new.
pub fn record_menu_dishes(pool: &DbPool, dishes: &[&menu::Dish]) -> AppResult<usize> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO dish (did, name) VALUES (?1, ?2)")?;
        for dish in dishes {
            inserted += stmt.execute(params![dish.id, dish.name])?;
        }
    }
    tx.commit()?;

    if inserted > 0 {
        tracing::info!("Recorded {} new dishes", inserted);
    }
    Ok(inserted)
}

pub fn get_dish(pool: &DbPool, did: i64) -> AppResult<Option<Dish>> {
    let conn = pool.get()?;
    let dish = conn
        .query_row(
            "SELECT did, name, description FROM dish WHERE did = ?1",
            params![did],
            |row| {
                Ok(Dish {
                    did: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(dish)
}

/// Comments on a dish, newest first.
pub fn comments(pool: &DbPool, did: i64) -> AppResult<Vec<DishComment>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT c.commentid, c.owner, c.type, c.comment, u.name
         FROM comments c
         LEFT JOIN users u ON u.uid = c.owner
         WHERE c.dish = ?1
         ORDER BY c.commentid DESC",
    )?;
    let rows = stmt
        .query_map(params![did], |row| {
            Ok(DishComment {
                commentid: row.get(0)?,
                owner: row.get(1)?,
                kind: row.get(2)?,
                comment: row.get(3)?,
                owner_name: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Pictures of a dish, newest first.
pub fn pictures(pool: &DbPool, did: i64) -> AppResult<Vec<DishPicture>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT p.pid, p.filename, p.owner, u.name
         FROM dish_picture p
         LEFT JOIN users u ON u.uid = p.owner
         WHERE p.did = ?1
         ORDER BY p.pid DESC",
    )?;
    let rows = stmt
        .query_map(params![did], |row| {
            Ok(DishPicture {
                pid: row.get(0)?,
                filename: row.get(1)?,
                owner: row.get(2)?,
                owner_name: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn add_comment(
    pool: &DbPool,
    did: i64,
    owner: i64,
    kind: &str,
    comment: &str,
) -> AppResult<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO comments (dish, owner, type, comment) VALUES (?1, ?2, ?3, ?4)",
        params![did, owner, kind, comment],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn add_picture(pool: &DbPool, did: i64, owner: i64, filename: &str) -> AppResult<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO dish_picture (did, filename, owner) VALUES (?1, ?2, ?3)",
        params![did, filename, owner],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_comment(
    pool: &DbPool,
    requester: i64,
    did: i64,
    commentid: i64,
) -> AppResult<DeleteOutcome> {
    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let owner: Option<Option<i64>> = tx
        .query_row(
            "SELECT owner FROM comments WHERE commentid = ?1 AND dish = ?2",
            params![commentid, did],
            |row| row.get(0),
        )
        .optional()?;

    let outcome = match owner {
        None => DeleteOutcome::NotFound(DeleteTarget::Comment),
        Some(owner) if owner != Some(requester) => {
            DeleteOutcome::Forbidden(DeleteTarget::Comment)
        }
        Some(_) => {
            tx.execute("DELETE FROM comments WHERE commentid = ?1", params![commentid])?;
            tx.commit()?;
            DeleteOutcome::Deleted(DeleteTarget::Comment)
        }
    };

    tracing::info!(
        "User {} delete comment {} on dish {}: {:?}",
        requester,
        commentid,
        did,
        outcome
    );
    Ok(outcome)
}

/// Delete a picture row. When no other row still points at the same file,
/// its name comes back so the caller can remove it from disk.
pub fn delete_picture(
    pool: &DbPool,
    requester: i64,
    did: i64,
    pid: i64,
) -> AppResult<(DeleteOutcome, Option<String>)> {
    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let found: Option<(String, Option<i64>)> = tx
        .query_row(
            "SELECT filename, owner FROM dish_picture WHERE pid = ?1 AND did = ?2",
            params![pid, did],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let result = match found {
        None => (DeleteOutcome::NotFound(DeleteTarget::Picture), None),
        Some((_, owner)) if owner != Some(requester) => {
            (DeleteOutcome::Forbidden(DeleteTarget::Picture), None)
        }
        Some((filename, _)) => {
            tx.execute("DELETE FROM dish_picture WHERE pid = ?1", params![pid])?;
            let still_used: bool = tx.query_row(
                "SELECT COUNT(*) > 0 FROM dish_picture WHERE filename = ?1",
                params![filename],
                |row| row.get(0),
            )?;
            tx.commit()?;
            let orphan = (!still_used).then_some(filename);
            (DeleteOutcome::Deleted(DeleteTarget::Picture), orphan)
        }
    };

    tracing::info!(
        "User {} delete picture {} on dish {}: {:?}",
        requester,
        pid,
        did,
        result.0
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use r2d2_sqlite::SqliteConnectionManager;

    fn test_pool() -> DbPool {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        crate::db::run_migrations(&pool).unwrap();
        pool.get()
            .unwrap()
            .execute_batch(
                "INSERT INTO users (uid, name, hashed) VALUES (1, 'ada', 'x'), (2, 'bo', 'y');
                 INSERT INTO dish (did, name) VALUES (10, 'Tomato Soup');",
            )
            .unwrap();
        pool
    }

    #[test]
    fn allowed_file_checks_extension_case_insensitively() {
        assert!(allowed_file("soup.png"));
        assert!(allowed_file("soup.JPG"));
        assert!(allowed_file("a.b.jpeg"));
        assert!(!allowed_file("soup.webp"));
        assert!(!allowed_file("soup"));
        assert!(!allowed_file("png"));
    }

    #[test]
    fn stored_filename_strips_directories_and_odd_characters() {
        assert_eq!(
            stored_filename(10, "../../etc/my soup.png").as_deref(),
            Some("dish10_my_soup.png")
        );
        assert_eq!(
            stored_filename(3, "C:\\pics\\lunch.GIF").as_deref(),
            Some("dish3_lunch.GIF")
        );
        assert_eq!(stored_filename(3, "notes.txt"), None);
        assert_eq!(stored_filename(3, "../"), None);
    }

    #[test]
    fn record_menu_dishes_ignores_known_ids() {
        let pool = test_pool();
        let soup = menu::Dish {
            id: 10,
            name: "Renamed Soup".to_string(),
            station: "Soup".to_string(),
        };
        let salad = menu::Dish {
            id: 11,
            name: "Salad".to_string(),
            station: "Greens".to_string(),
        };

        assert_eq!(record_menu_dishes(&pool, &[&soup, &salad]).unwrap(), 1);
        assert_eq!(get_dish(&pool, 10).unwrap().unwrap().name, "Tomato Soup");
        assert_eq!(get_dish(&pool, 11).unwrap().unwrap().name, "Salad");
    }

    #[test]
    fn comments_come_back_newest_first_with_names() {
        let pool = test_pool();
        add_comment(&pool, 10, 1, "yum", "great").unwrap();
        add_comment(&pool, 10, 2, "yuck", "too salty").unwrap();

        let list = comments(&pool, 10).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].comment, "too salty");
        assert_eq!(list[0].kind, "yuck");
        assert_eq!(list[0].owner_name.as_deref(), Some("bo"));
    }

    #[test]
    fn only_the_owner_deletes_a_comment() {
        let pool = test_pool();
        let id = add_comment(&pool, 10, 1, "yum", "great").unwrap();

        assert_eq!(
            delete_comment(&pool, 2, 10, id).unwrap(),
            DeleteOutcome::Forbidden(DeleteTarget::Comment)
        );
        assert_eq!(
            delete_comment(&pool, 1, 11, id).unwrap(),
            DeleteOutcome::NotFound(DeleteTarget::Comment)
        );
        assert_eq!(
            delete_comment(&pool, 1, 10, id).unwrap(),
            DeleteOutcome::Deleted(DeleteTarget::Comment)
        );
        assert!(comments(&pool, 10).unwrap().is_empty());
    }

    #[test]
    fn shared_picture_file_is_kept_until_last_row_goes() {
        let pool = test_pool();
        let first = add_picture(&pool, 10, 1, "dish10_soup.png").unwrap();
        let second = add_picture(&pool, 10, 2, "dish10_soup.png").unwrap();

        let (outcome, orphan) = delete_picture(&pool, 1, 10, first).unwrap();
        assert!(outcome.ok());
        assert_eq!(orphan, None);

        let (outcome, orphan) = delete_picture(&pool, 1, 10, second).unwrap();
        assert_eq!(outcome, DeleteOutcome::Forbidden(DeleteTarget::Picture));
        assert_eq!(orphan, None);

        let (outcome, orphan) = delete_picture(&pool, 2, 10, second).unwrap();
        assert!(outcome.ok());
        assert_eq!(orphan.as_deref(), Some("dish10_soup.png"));
        assert!(pictures(&pool, 10).unwrap().is_empty());
    }
}
