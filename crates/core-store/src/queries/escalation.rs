use core_types::{Escalation, EscalationStatus, EscalationSummary};
use rusqlite::{Connection, params};

use crate::time::{from_text, now_text};
use crate::{Error, Result};

pub fn open(conn: &Connection, session_id: Option<&str>, issue: &str) -> Result<Escalation> {
    conn.execute(
        "INSERT INTO escalations (session_id, issue, status, created_at, resolved_at) VALUES (?1, ?2, ?3, ?4, NULL)",
        params![session_id, issue, EscalationStatus::Open.as_str(), now_text()],
    )?;
    let id = conn.last_insert_rowid();
    get(conn, id)?.ok_or_else(|| Error::Query("escalation vanished immediately after insert".into()))
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Escalation>> {
    conn.query_row("SELECT * FROM escalations WHERE id = ?1", [id], from_row)
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(Error::from(other)),
        })
}

fn set_status(conn: &Connection, id: i64, status: EscalationStatus) -> Result<()> {
    conn.execute(
        "UPDATE escalations SET status = ?1, resolved_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_text(), id],
    )?;
    Ok(())
}

pub fn resolve(conn: &Connection, id: i64) -> Result<()> {
    set_status(conn, id, EscalationStatus::Resolved)
}

pub fn dismiss(conn: &Connection, id: i64) -> Result<()> {
    set_status(conn, id, EscalationStatus::Dismissed)
}

pub fn list(conn: &Connection, status: Option<EscalationStatus>) -> Result<Vec<Escalation>> {
    let query = match status {
        Some(_) => "SELECT * FROM escalations WHERE status = ?1 ORDER BY created_at DESC",
        None => "SELECT * FROM escalations ORDER BY created_at DESC",
    };
    let mut stmt = conn.prepare(query)?;
    let rows = match status {
        Some(status) => stmt
            .query_map([status.as_str()], from_row)?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?,
        None => stmt
            .query_map([], from_row)?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?,
    };
    Ok(rows)
}

pub fn summary(conn: &Connection) -> Result<EscalationSummary> {
    let all = list(conn, None)?;
    let mut summary = EscalationSummary::default();
    for escalation in all {
        match escalation.status {
            EscalationStatus::Open => summary.open += 1,
            EscalationStatus::Resolved => summary.resolved += 1,
            EscalationStatus::Dismissed => summary.dismissed += 1,
        }
    }
    Ok(summary)
}

fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Escalation> {
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let resolved_at: Option<String> = row.get("resolved_at")?;

    Ok(Escalation {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        issue: row.get("issue")?,
        status: status
            .parse::<EscalationStatus>()
            .map_err(|e| rusqlite::Error::InvalidColumnName(e))?,
        created_at: from_text(&created_at)
            .map_err(|e| rusqlite::Error::InvalidColumnName(e.to_string()))?,
        resolved_at: resolved_at
            .map(|s| from_text(&s))
            .transpose()
            .map_err(|e| rusqlite::Error::InvalidColumnName(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[test]
    fn open_resolve_and_summarize() {
        let db = Database::open_in_memory().unwrap();
        let escalation = db
            .with_conn(|conn| open(conn, Some("s1"), "worker can't find the spec file"))
            .unwrap();

        db.with_conn(|conn| resolve(conn, escalation.id)).unwrap();

        let summary = db.with_conn(summary).unwrap();
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.open, 0);
    }

    #[test]
    fn list_filters_by_status() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            open(conn, None, "issue 1")?;
            let e2 = open(conn, None, "issue 2")?;
            dismiss(conn, e2.id)
        })
        .unwrap();

        let open_only = db
            .with_conn(|conn| list(conn, Some(EscalationStatus::Open)))
            .unwrap();
        assert_eq!(open_only.len(), 1);
    }
}
