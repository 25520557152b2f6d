use core_types::{Pipeline, PipelineProgress, PipelineStatus};
use rusqlite::{Connection, params};

use crate::ids::ensure_id;
use crate::time::{from_text, now_text};
use crate::{Error, Result};

pub fn create(conn: &Connection, id: Option<String>, name: &str) -> Result<Pipeline> {
    let id = ensure_id(id, "pipe");
    conn.execute(
        "INSERT INTO pipelines (id, name, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, name, status_str(PipelineStatus::Pending), now_text()],
    )?;
    get(conn, &id)?.ok_or_else(|| Error::Query("pipeline vanished immediately after insert".into()))
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<Pipeline>> {
    conn.query_row("SELECT * FROM pipelines WHERE id = ?1", [id], from_row)
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(Error::from(other)),
        })
}

pub fn list(conn: &Connection) -> Result<Vec<Pipeline>> {
    let mut stmt = conn.prepare("SELECT * FROM pipelines ORDER BY created_at")?;
    let rows = stmt
        .query_map([], from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

pub fn update_status(conn: &Connection, id: &str, status: PipelineStatus) -> Result<()> {
    conn.execute(
        "UPDATE pipelines SET status = ?1 WHERE id = ?2",
        params![status_str(status), id],
    )?;
    Ok(())
}

pub fn progress(conn: &Connection, id: &str) -> Result<Option<PipelineProgress>> {
    let Some(pipeline) = get(conn, id)? else {
        return Ok(None);
    };
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ports WHERE pipeline_id = ?1",
        [id],
        |row| row.get(0),
    )?;
    let complete: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ports WHERE pipeline_id = ?1 AND status = 'complete'",
        [id],
        |row| row.get(0),
    )?;
    Ok(Some(PipelineProgress {
        pipeline,
        complete,
        total,
    }))
}

fn status_str(status: PipelineStatus) -> &'static str {
    match status {
        PipelineStatus::Pending => "pending",
        PipelineStatus::Running => "running",
        PipelineStatus::Complete => "complete",
        PipelineStatus::Failed => "failed",
    }
}

fn parse_status(s: &str) -> rusqlite::Result<PipelineStatus> {
    match s {
        "pending" => Ok(PipelineStatus::Pending),
        "running" => Ok(PipelineStatus::Running),
        "complete" => Ok(PipelineStatus::Complete),
        "failed" => Ok(PipelineStatus::Failed),
        other => Err(rusqlite::Error::InvalidColumnName(format!(
            "unknown pipeline status '{other}'"
        ))),
    }
}

fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Pipeline> {
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    Ok(Pipeline {
        id: row.get("id")?,
        name: row.get("name")?,
        status: parse_status(&status)?,
        created_at: from_text(&created_at)
            .map_err(|e| rusqlite::Error::InvalidColumnName(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::queries::port;
    use core_types::{Port, PortStatus};

    #[test]
    fn progress_counts_complete_ports() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let pipeline = create(conn, None, "build feature x")?;
            let mut p1 = Port {
                id: "p1".to_string(),
                title: "step 1".to_string(),
                file: None,
                status: PortStatus::Complete,
                pipeline_id: Some(pipeline.id.clone()),
                linked_session_id: None,
                estimated_tokens: None,
                estimated_cost: None,
                estimated_duration_secs: None,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            };
            port::insert(conn, &p1, &[])?;
            p1.id = "p2".to_string();
            p1.status = PortStatus::Pending;
            port::insert(conn, &p1, &[])?;

            let progress = progress(conn, &pipeline.id)?.unwrap();
            assert_eq!(progress.total, 2);
            assert_eq!(progress.complete, 1);
            Ok(())
        })
        .unwrap();
    }
}
