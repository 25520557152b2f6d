//! Row <-> domain-type mapping shared across query modules.

use core_types::{
    Message, MessageStatus, MessageType, Port, PortStatus, Session, SessionStatus, SessionType,
};
use rusqlite::Row;

use crate::time::from_text;

fn col_err(msg: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::other(msg.into())),
    )
}

pub fn session_from_row(row: &Row) -> rusqlite::Result<Session> {
    let session_type: String = row.get("session_type")?;
    let status: String = row.get("status")?;
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;

    Ok(Session {
        id: row.get("id")?,
        title: row.get("title")?,
        session_type: session_type.parse::<SessionType>().map_err(col_err)?,
        depth: row.get("depth")?,
        parent_id: row.get("parent_id")?,
        root_id: row.get("root_id")?,
        project_root: row.get("project_root")?,
        linked_port_id: row.get("linked_port_id")?,
        agent_id: row.get("agent_id")?,
        token_budget: row.get("token_budget")?,
        tokens_used: row.get("tokens_used")?,
        cumulative_cost: row.get("cumulative_cost")?,
        status: status.parse::<SessionStatus>().map_err(col_err)?,
        started_at: from_text(&started_at).map_err(|e| col_err(e.to_string()))?,
        ended_at: ended_at
            .map(|s| from_text(&s))
            .transpose()
            .map_err(|e| col_err(e.to_string()))?,
    })
}

pub fn port_from_row(row: &Row) -> rusqlite::Result<Port> {
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Port {
        id: row.get("id")?,
        title: row.get("title")?,
        file: row.get("file")?,
        status: status.parse::<PortStatus>().map_err(col_err)?,
        pipeline_id: row.get("pipeline_id")?,
        linked_session_id: row.get("linked_session_id")?,
        estimated_tokens: row.get("estimated_tokens")?,
        estimated_cost: row.get("estimated_cost")?,
        estimated_duration_secs: row.get("estimated_duration_secs")?,
        created_at: from_text(&created_at).map_err(|e| col_err(e.to_string()))?,
        updated_at: from_text(&updated_at).map_err(|e| col_err(e.to_string()))?,
    })
}

pub fn message_from_row(row: &Row) -> rusqlite::Result<Message> {
    let message_type: String = row.get("message_type")?;
    let status: String = row.get("status")?;
    let payload: String = row.get("payload")?;
    let created_at: String = row.get("created_at")?;
    let processed_at: Option<String> = row.get("processed_at")?;

    Ok(Message {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        from_session: row.get("from_session")?,
        to_session: row.get("to_session")?,
        message_type: message_type.parse::<MessageType>().map_err(col_err)?,
        subtype: row.get("subtype")?,
        payload: serde_json::from_str(&payload).map_err(|e| col_err(e.to_string()))?,
        attention_score: row.get("attention_score")?,
        token_count: row.get("token_count")?,
        cumulative_tokens: row.get("cumulative_tokens")?,
        status: status.parse::<MessageStatus>().map_err(col_err)?,
        created_at: from_text(&created_at).map_err(|e| col_err(e.to_string()))?,
        processed_at: processed_at
            .map(|s| from_text(&s))
            .transpose()
            .map_err(|e| col_err(e.to_string()))?,
        port_id: row.get("port_id")?,
        priority: row.get("priority")?,
    })
}
