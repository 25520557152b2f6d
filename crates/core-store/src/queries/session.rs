use core_types::{Session, SessionStatus};
use rusqlite::{Connection, params};

use crate::rows::session_from_row;
use crate::time::{now_text, to_text};
use crate::{Error, Result};

pub fn insert(conn: &Connection, session: &Session) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO sessions (
            id, title, session_type, depth, parent_id, root_id, project_root,
            linked_port_id, agent_id, token_budget, tokens_used, cumulative_cost,
            status, started_at, ended_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
        params![
            session.id,
            session.title,
            session.session_type.as_str(),
            session.depth,
            session.parent_id,
            session.root_id,
            session.project_root,
            session.linked_port_id,
            session.agent_id,
            session.token_budget,
            session.tokens_used,
            session.cumulative_cost,
            session.status.as_str(),
            to_text(session.started_at),
            session.ended_at.map(to_text),
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<Session>> {
    conn.query_row("SELECT * FROM sessions WHERE id = ?1", [id], |row| {
        session_from_row(row)
    })
    .map(Some)
    .or_else(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(Error::from(other)),
    })
}

pub fn children(conn: &Connection, parent_id: &str) -> Result<Vec<Session>> {
    let mut stmt = conn.prepare("SELECT * FROM sessions WHERE parent_id = ?1 ORDER BY started_at")?;
    let rows = stmt
        .query_map([parent_id], session_from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

pub fn tree(conn: &Connection, root_id: &str) -> Result<Vec<Session>> {
    let mut stmt =
        conn.prepare("SELECT * FROM sessions WHERE root_id = ?1 ORDER BY depth, started_at")?;
    let rows = stmt
        .query_map([root_id], session_from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

pub fn list(
    conn: &Connection,
    project_root: Option<&str>,
    status: Option<SessionStatus>,
) -> Result<Vec<Session>> {
    let mut where_clauses: Vec<&str> = Vec::new();
    let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(root) = project_root {
        where_clauses.push("project_root = ?");
        bind.push(Box::new(root.to_string()));
    }
    if let Some(status) = status {
        where_clauses.push("status = ?");
        bind.push(Box::new(status.as_str().to_string()));
    }

    let where_clause = if where_clauses.is_empty() {
        "1=1".to_string()
    } else {
        where_clauses.join(" AND ")
    };

    let query = format!("SELECT * FROM sessions WHERE {where_clause} ORDER BY started_at DESC");
    let mut stmt = conn.prepare(&query)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), session_from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

pub fn update_status(
    conn: &Connection,
    id: &str,
    status: SessionStatus,
    ended_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET status = ?1, ended_at = ?2 WHERE id = ?3",
        params![status.as_str(), ended_at.map(to_text), id],
    )?;
    Ok(())
}

pub fn record_usage(conn: &Connection, id: &str, tokens_used: i64, cumulative_cost: f64) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET tokens_used = ?1, cumulative_cost = ?2 WHERE id = ?3",
        params![tokens_used, cumulative_cost, id],
    )?;
    Ok(())
}

pub fn find_by_prefix(conn: &Connection, prefix: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT id FROM sessions WHERE id LIKE ?1 LIMIT 2")?;
    let pattern = format!("{prefix}%");
    let mut matches: Vec<String> = stmt
        .query_map([&pattern], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        _ => Err(Error::Query(format!(
            "ambiguous session id prefix '{prefix}': multiple sessions match"
        ))),
    }
}

pub fn insert_event(
    conn: &Connection,
    session_id: &str,
    event_type: &str,
    event_data: &serde_json::Value,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO session_events (session_id, event_type, event_data, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![session_id, event_type, event_data.to_string(), now_text()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn events(conn: &Connection, session_id: &str) -> Result<Vec<core_types::SessionEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, event_type, event_data, created_at FROM session_events
         WHERE session_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([session_id], |row| {
            let data: String = row.get("event_data")?;
            let created_at: String = row.get("created_at")?;
            Ok(core_types::SessionEvent {
                id: row.get("id")?,
                session_id: row.get("session_id")?,
                event_type: row.get("event_type")?,
                event_data: serde_json::from_str(&data).unwrap_or(serde_json::Value::Null),
                created_at: crate::time::from_text(&created_at)
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
    use core_types::SessionType;

    fn sample(id: &str) -> Session {
        Session {
            id: id.to_string(),
            title: "test session".to_string(),
            session_type: SessionType::Build,
            depth: 0,
            parent_id: None,
            root_id: id.to_string(),
            project_root: "/tmp/project".to_string(),
            linked_port_id: None,
            agent_id: None,
            token_budget: 100_000,
            tokens_used: 0,
            cumulative_cost: 0.0,
            status: SessionStatus::Running,
            started_at: chrono::Utc::now(),
            ended_at: None,
        }
    }

    #[test]
    fn insert_and_get_roundtrips() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| insert(conn, &sample("s1"))).unwrap();
        let fetched = db.with_conn(|conn| get(conn, "s1")).unwrap().unwrap();
        assert_eq!(fetched.title, "test session");
        assert_eq!(fetched.status, SessionStatus::Running);
    }

    #[test]
    fn find_by_prefix_is_ambiguous_on_multiple_matches() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            insert(conn, &sample("abc111"))?;
            insert(conn, &sample("abc222"))
        })
        .unwrap();

        let result = db.with_conn(|conn| find_by_prefix(conn, "abc"));
        assert!(result.is_err());
    }

    #[test]
    fn children_orders_by_start_time() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let mut child1 = sample("child1");
            child1.parent_id = Some("root".to_string());
            let mut child2 = sample("child2");
            child2.parent_id = Some("root".to_string());
            insert(conn, &sample("root"))?;
            insert(conn, &child1)?;
            insert(conn, &child2)
        })
        .unwrap();

        let kids = db.with_conn(|conn| children(conn, "root")).unwrap();
        assert_eq!(kids.len(), 2);
    }
}
