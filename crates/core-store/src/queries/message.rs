use core_types::{Message, MessageStatus, DEFAULT_PRIORITY, NewMessage};
use rusqlite::{Connection, params};

use crate::ids::ensure_id;
use crate::rows::message_from_row;
use crate::time::now_text;
use crate::{Error, Result};

pub fn send(conn: &Connection, new: &NewMessage) -> Result<Message> {
    let id = ensure_id(new.id.clone(), "msg");
    let created_at = now_text();
    let priority = new.priority.unwrap_or(DEFAULT_PRIORITY);

    conn.execute(
        r#"
        INSERT INTO messages (
            id, conversation_id, from_session, to_session, message_type, subtype,
            payload, attention_score, token_count, cumulative_tokens, status,
            created_at, processed_at, port_id, priority
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9, ?10, ?11, NULL, ?12, ?13)
        "#,
        params![
            id,
            new.conversation_id,
            new.from_session,
            new.to_session,
            new.message_type.as_str(),
            new.subtype,
            new.payload.to_string(),
            new.token_count,
            new.cumulative_tokens,
            MessageStatus::Pending.as_str(),
            created_at,
            new.port_id,
            priority,
        ],
    )?;

    get(conn, &id)?.ok_or_else(|| Error::Query("message vanished immediately after insert".into()))
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<Message>> {
    conn.query_row("SELECT * FROM messages WHERE id = ?1", [id], message_from_row)
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(Error::from(other)),
        })
}

/// Pending messages addressed to `session_id` directly, plus any broadcast
/// message (`to_session IS NULL`) not yet processed, ordered by priority
/// (lower = more urgent) then arrival — the ordering contract of §4.5.
pub fn receive(conn: &Connection, session_id: &str, limit: i64) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT * FROM messages
        WHERE status = 'pending' AND (to_session = ?1 OR to_session IS NULL)
        ORDER BY priority ASC, created_at ASC
        LIMIT ?2
        "#,
    )?;
    let rows = stmt
        .query_map(params![session_id, limit], message_from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

pub fn mark_processed(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE messages SET status = ?1, processed_at = ?2 WHERE id = ?3",
        params![MessageStatus::Processed.as_str(), now_text(), id],
    )?;
    Ok(())
}

pub fn by_conversation(conn: &Connection, conversation_id: &str) -> Result<Vec<Message>> {
    let mut stmt =
        conn.prepare("SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY created_at")?;
    let rows = stmt
        .query_map([conversation_id], message_from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

pub fn conversation_tokens(conn: &Connection, conversation_id: &str) -> Result<i64> {
    let total: Option<i64> = conn.query_row(
        "SELECT SUM(token_count) FROM messages WHERE conversation_id = ?1",
        [conversation_id],
        |row| row.get(0),
    )?;
    Ok(total.unwrap_or(0))
}

/// Mark every still-pending message older than `older_than_secs` as expired.
/// Returns the number of rows changed, for the bus's periodic sweep.
pub fn sweep_expired(conn: &Connection, older_than_secs: i64) -> Result<u64> {
    let cutoff = chrono::Utc::now() - chrono::Duration::seconds(older_than_secs);
    let changed = conn.execute(
        "UPDATE messages SET status = ?1 WHERE status = 'pending' AND created_at < ?2",
        params![MessageStatus::Expired.as_str(), crate::time::to_text(cutoff)],
    )?;
    Ok(changed as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use core_types::MessageType;

    fn sample(to: Option<&str>) -> NewMessage {
        NewMessage {
            id: None,
            conversation_id: "conv-1".to_string(),
            from_session: "s1".to_string(),
            to_session: to.map(|s| s.to_string()),
            message_type: MessageType::Request,
            subtype: "task_assign".to_string(),
            payload: serde_json::json!({"port_id": "p1"}),
            token_count: Some(42),
            cumulative_tokens: Some(42),
            port_id: Some("p1".to_string()),
            priority: None,
        }
    }

    #[test]
    fn send_and_receive_direct_message() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| send(conn, &sample(Some("s2")))).unwrap();

        let inbox = db.with_conn(|conn| receive(conn, "s2", 10)).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn broadcast_message_is_visible_to_any_recipient() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| send(conn, &sample(None))).unwrap();

        let inbox_a = db.with_conn(|conn| receive(conn, "sA", 10)).unwrap();
        let inbox_b = db.with_conn(|conn| receive(conn, "sB", 10)).unwrap();
        assert_eq!(inbox_a.len(), 1);
        assert_eq!(inbox_b.len(), 1);
    }

    #[test]
    fn more_urgent_priority_is_received_first() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let mut low_priority = sample(Some("s2"));
            low_priority.priority = Some(9);
            let mut urgent = sample(Some("s2"));
            urgent.priority = Some(1);
            send(conn, &low_priority)?;
            send(conn, &urgent)
        })
        .unwrap();

        let inbox = db.with_conn(|conn| receive(conn, "s2", 10)).unwrap();
        assert_eq!(inbox[0].priority, 1);
    }

    #[test]
    fn conversation_tokens_sums_all_messages() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            send(conn, &sample(Some("s2")))?;
            send(conn, &sample(Some("s3")))
        })
        .unwrap();

        let total = db.with_conn(|conn| conversation_tokens(conn, "conv-1")).unwrap();
        assert_eq!(total, 84);
    }
}
