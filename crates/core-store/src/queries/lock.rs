use core_types::Lock;
use rusqlite::{Connection, params};

use crate::time::{from_text, now_text};
use crate::{Error, Result};

/// Acquire `resource` for `session_id`. Fails with `Error::Query` if another
/// session already holds it; acquiring a lock you already hold is a no-op.
pub fn acquire(conn: &Connection, resource: &str, session_id: &str) -> Result<()> {
    if let Some(holder) = holder(conn, resource)? {
        if holder == session_id {
            return Ok(());
        }
        return Err(Error::Query(format!(
            "resource '{resource}' is held by session '{holder}'"
        )));
    }

    conn.execute(
        "INSERT INTO locks (resource, session_id, acquired_at) VALUES (?1, ?2, ?3)",
        params![resource, session_id, now_text()],
    )?;
    Ok(())
}

pub fn release(conn: &Connection, resource: &str, session_id: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM locks WHERE resource = ?1 AND session_id = ?2",
        params![resource, session_id],
    )?;
    Ok(())
}

/// Release every lock held by `session_id`, regardless of resource. Used by
/// the crash-sweep on startup to recover locks left by a session that died
/// without calling `release`.
pub fn release_all_for_session(conn: &Connection, session_id: &str) -> Result<u64> {
    let changed = conn.execute("DELETE FROM locks WHERE session_id = ?1", [session_id])?;
    Ok(changed as u64)
}

pub fn holder(conn: &Connection, resource: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT session_id FROM locks WHERE resource = ?1",
        [resource],
        |row| row.get(0),
    )
    .map(Some)
    .or_else(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(Error::from(other)),
    })
}

pub fn list(conn: &Connection) -> Result<Vec<Lock>> {
    let mut stmt = conn.prepare("SELECT resource, session_id, acquired_at FROM locks ORDER BY acquired_at")?;
    let rows = stmt
        .query_map([], |row| {
            let acquired_at: String = row.get("acquired_at")?;
            Ok(Lock {
                resource: row.get("resource")?,
                session_id: row.get("session_id")?,
                acquired_at: from_text(&acquired_at)
                    .map_err(|e| rusqlite::Error::InvalidColumnName(e.to_string()))?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[test]
    fn acquire_blocks_second_session() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| acquire(conn, "file:foo.rs", "s1")).unwrap();
        let err = db.with_conn(|conn| acquire(conn, "file:foo.rs", "s2"));
        assert!(err.is_err());
    }

    #[test]
    fn acquire_is_idempotent_for_the_holder() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| acquire(conn, "file:foo.rs", "s1")).unwrap();
        db.with_conn(|conn| acquire(conn, "file:foo.rs", "s1")).unwrap();
    }

    #[test]
    fn release_all_for_session_frees_every_resource() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            acquire(conn, "file:a.rs", "s1")?;
            acquire(conn, "file:b.rs", "s1")
        })
        .unwrap();

        let freed = db.with_conn(|conn| release_all_for_session(conn, "s1")).unwrap();
        assert_eq!(freed, 2);
        assert!(db.with_conn(|conn| holder(conn, "file:a.rs")).unwrap().is_none());
    }
}
