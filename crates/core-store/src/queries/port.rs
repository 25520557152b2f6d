use core_types::{Port, PortStatus, PortSummary};
use rusqlite::{Connection, params};

use crate::rows::port_from_row;
use crate::time::{now_text, to_text};
use crate::{Error, Result};

pub fn insert(conn: &Connection, port: &Port, depends_on: &[String]) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO ports (
            id, title, file, status, pipeline_id, linked_session_id,
            estimated_tokens, estimated_cost, estimated_duration_secs,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            port.id,
            port.title,
            port.file,
            port.status.as_str(),
            port.pipeline_id,
            port.linked_session_id,
            port.estimated_tokens,
            port.estimated_cost,
            port.estimated_duration_secs,
            to_text(port.created_at),
            to_text(port.updated_at),
        ],
    )?;

    for dep in depends_on {
        conn.execute(
            "INSERT INTO port_dependencies (port_id, depends_on_port_id) VALUES (?1, ?2)",
            params![port.id, dep],
        )?;
    }
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<Port>> {
    conn.query_row("SELECT * FROM ports WHERE id = ?1", [id], port_from_row)
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(Error::from(other)),
        })
}

pub fn dependencies(conn: &Connection, port_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT depends_on_port_id FROM port_dependencies WHERE port_id = ?1")?;
    let rows = stmt
        .query_map([port_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, rusqlite::Error>>()?;
    Ok(rows)
}

/// True when every dependency of `port_id` is `complete`.
pub fn dependencies_satisfied(conn: &Connection, port_id: &str) -> Result<bool> {
    let unmet: i64 = conn.query_row(
        r#"
        SELECT COUNT(*) FROM port_dependencies pd
        JOIN ports p ON p.id = pd.depends_on_port_id
        WHERE pd.port_id = ?1 AND p.status != 'complete'
        "#,
        [port_id],
        |row| row.get(0),
    )?;
    Ok(unmet == 0)
}

pub fn list(
    conn: &Connection,
    pipeline_id: Option<&str>,
    status: Option<PortStatus>,
) -> Result<Vec<Port>> {
    let mut where_clauses: Vec<&str> = Vec::new();
    let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(pipeline_id) = pipeline_id {
        where_clauses.push("pipeline_id = ?");
        bind.push(Box::new(pipeline_id.to_string()));
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

    let query = format!("SELECT * FROM ports WHERE {where_clause} ORDER BY created_at");
    let mut stmt = conn.prepare(&query)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), port_from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

pub fn update_status(
    conn: &Connection,
    id: &str,
    status: PortStatus,
    linked_session_id: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE ports SET status = ?1, linked_session_id = COALESCE(?2, linked_session_id), updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), linked_session_id, now_text(), id],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM port_dependencies WHERE port_id = ?1 OR depends_on_port_id = ?1", [id])?;
    conn.execute("DELETE FROM ports WHERE id = ?1", [id])?;
    Ok(())
}

pub fn summary(conn: &Connection, pipeline_id: Option<&str>) -> Result<PortSummary> {
    let ports = list(conn, pipeline_id, None)?;
    let mut summary = PortSummary::default();
    for port in ports {
        match port.status {
            PortStatus::Pending => summary.pending += 1,
            PortStatus::Running => summary.running += 1,
            PortStatus::Blocked => summary.blocked += 1,
            PortStatus::Complete => summary.complete += 1,
            PortStatus::Failed => summary.failed += 1,
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn sample(id: &str, status: PortStatus) -> Port {
        Port {
            id: id.to_string(),
            title: "implement thing".to_string(),
            file: Some(format!("ports/{id}.md")),
            status,
            pipeline_id: None,
            linked_session_id: None,
            estimated_tokens: Some(1000),
            estimated_cost: Some(0.01),
            estimated_duration_secs: Some(60),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn dependencies_satisfied_when_none_declared() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| insert(conn, &sample("p1", PortStatus::Pending), &[]))
            .unwrap();
        assert!(db.with_conn(|conn| dependencies_satisfied(conn, "p1")).unwrap());
    }

    #[test]
    fn dependencies_unsatisfied_until_dependency_completes() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            insert(conn, &sample("p1", PortStatus::Pending), &[])?;
            insert(
                conn,
                &sample("p2", PortStatus::Pending),
                &["p1".to_string()],
            )
        })
        .unwrap();

        assert!(!db.with_conn(|conn| dependencies_satisfied(conn, "p2")).unwrap());

        db.with_conn(|conn| update_status(conn, "p1", PortStatus::Complete, None))
            .unwrap();

        assert!(db.with_conn(|conn| dependencies_satisfied(conn, "p2")).unwrap());
    }

    #[test]
    fn summary_counts_by_status() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            insert(conn, &sample("p1", PortStatus::Pending), &[])?;
            insert(conn, &sample("p2", PortStatus::Running), &[])?;
            insert(conn, &sample("p3", PortStatus::Complete), &[])
        })
        .unwrap();

        let summary = db.with_conn(|conn| summary(conn, None)).unwrap();
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.running, 1);
        assert_eq!(summary.complete, 1);
    }
}
