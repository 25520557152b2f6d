use rusqlite::Connection;

use crate::Result;

// NOTE: Migration design
//
// Unlike a derived index (safe to drop and rebuild from source logs on any
// schema change), this store holds the source of truth for Session/Port/
// Message/Lock/Escalation state. Migrations here are therefore additive and
// tracked by id in `schema_migrations`, never a blanket drop-and-recreate.

pub const SCHEMA_VERSION: i64 = 1;

struct Migration {
    id: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    id: 1,
    sql: r#"
        CREATE TABLE sessions (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            session_type TEXT NOT NULL,
            depth INTEGER NOT NULL,
            parent_id TEXT REFERENCES sessions(id),
            root_id TEXT NOT NULL,
            project_root TEXT NOT NULL,
            linked_port_id TEXT,
            agent_id TEXT,
            token_budget INTEGER NOT NULL DEFAULT 0,
            tokens_used INTEGER NOT NULL DEFAULT 0,
            cumulative_cost REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at TEXT
        );
        CREATE INDEX idx_sessions_parent ON sessions(parent_id);
        CREATE INDEX idx_sessions_root ON sessions(root_id, depth, started_at);

        CREATE TABLE session_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL REFERENCES sessions(id),
            event_type TEXT NOT NULL,
            event_data TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX idx_session_events_session ON session_events(session_id, id);

        CREATE TABLE pipelines (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE ports (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            file TEXT,
            status TEXT NOT NULL,
            pipeline_id TEXT REFERENCES pipelines(id),
            linked_session_id TEXT,
            estimated_tokens INTEGER,
            estimated_cost REAL,
            estimated_duration_secs INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX idx_ports_status ON ports(status);
        CREATE INDEX idx_ports_pipeline ON ports(pipeline_id);

        CREATE TABLE port_dependencies (
            port_id TEXT NOT NULL REFERENCES ports(id),
            depends_on_port_id TEXT NOT NULL REFERENCES ports(id),
            PRIMARY KEY (port_id, depends_on_port_id)
        );

        CREATE TABLE locks (
            resource TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            acquired_at TEXT NOT NULL
        );

        CREATE TABLE messages (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            from_session TEXT NOT NULL,
            to_session TEXT,
            message_type TEXT NOT NULL,
            subtype TEXT NOT NULL,
            payload TEXT NOT NULL,
            attention_score REAL,
            token_count INTEGER,
            cumulative_tokens INTEGER,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            processed_at TEXT,
            port_id TEXT,
            priority INTEGER NOT NULL DEFAULT 5
        );
        CREATE INDEX idx_messages_conversation ON messages(conversation_id, created_at);
        CREATE INDEX idx_messages_recipient ON messages(to_session, status, priority, created_at);

        CREATE TABLE compact_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            trigger_reason TEXT NOT NULL,
            before_tokens INTEGER NOT NULL,
            after_tokens INTEGER NOT NULL,
            preserved_context TEXT NOT NULL,
            occurred_at TEXT NOT NULL
        );

        CREATE TABLE checkpoints (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            port_id TEXT,
            summary TEXT NOT NULL,
            active_files TEXT NOT NULL,
            key_points TEXT NOT NULL,
            tokens_used INTEGER NOT NULL,
            token_budget INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX idx_checkpoints_session ON checkpoints(session_id, created_at);

        CREATE TABLE escalations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT,
            issue TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            resolved_at TEXT
        );
    "#,
}];

pub fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            id INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let applied: i64 = conn.query_row(
        "SELECT COALESCE(MAX(id), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    let tx = conn.transaction()?;
    for migration in MIGRATIONS.iter().filter(|m| m.id > applied) {
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (id, applied_at) VALUES (?1, datetime('now'))",
            [migration.id],
        )?;
    }
    tx.commit()?;

    Ok(())
}
