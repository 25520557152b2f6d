use core_types::{Checkpoint, NewCheckpoint};
use rusqlite::{Connection, params};

use crate::ids::ensure_id;
use crate::time::{from_text, now_text, to_text};
use crate::{Error, Result};

fn to_json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn from_json_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

pub fn create(conn: &Connection, new: &NewCheckpoint, tokens_used: i64, token_budget: i64) -> Result<Checkpoint> {
    let id = ensure_id(None, "ckpt");
    let created_at = now_text();

    conn.execute(
        r#"
        INSERT INTO checkpoints (
            id, session_id, port_id, summary, active_files, key_points,
            tokens_used, token_budget, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            id,
            new.session_id,
            new.port_id,
            new.summary,
            to_json_list(&new.active_files),
            to_json_list(&new.key_points),
            tokens_used,
            token_budget,
            created_at,
        ],
    )?;

    get(conn, &id)?.ok_or_else(|| Error::Query("checkpoint vanished immediately after insert".into()))
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<Checkpoint>> {
    conn.query_row("SELECT * FROM checkpoints WHERE id = ?1", [id], from_row)
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(Error::from(other)),
        })
}

pub fn latest_for_session(conn: &Connection, session_id: &str) -> Result<Option<Checkpoint>> {
    conn.query_row(
        "SELECT * FROM checkpoints WHERE session_id = ?1 ORDER BY created_at DESC LIMIT 1",
        [session_id],
        from_row,
    )
    .map(Some)
    .or_else(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(Error::from(other)),
    })
}

pub fn list_for_session(conn: &Connection, session_id: &str) -> Result<Vec<Checkpoint>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM checkpoints WHERE session_id = ?1 ORDER BY created_at",
    )?;
    let rows = stmt
        .query_map([session_id], from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

pub fn insert_compact_event(
    conn: &Connection,
    session_id: &str,
    trigger_reason: &str,
    before_tokens: i64,
    after_tokens: i64,
    preserved_context: &[String],
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO compact_events (
            session_id, trigger_reason, before_tokens, after_tokens,
            preserved_context, occurred_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            session_id,
            trigger_reason,
            before_tokens,
            after_tokens,
            to_json_list(preserved_context),
            now_text(),
        ],
    )?;
    Ok(())
}

fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Checkpoint> {
    let active_files: String = row.get("active_files")?;
    let key_points: String = row.get("key_points")?;
    let created_at: String = row.get("created_at")?;

    Ok(Checkpoint {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        port_id: row.get("port_id")?,
        summary: row.get("summary")?,
        active_files: from_json_list(&active_files),
        key_points: from_json_list(&key_points),
        tokens_used: row.get("tokens_used")?,
        token_budget: row.get("token_budget")?,
        created_at: from_text(&created_at)
            .map_err(|e| rusqlite::Error::InvalidColumnName(e.to_string()))?,
    })
}
