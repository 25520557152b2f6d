use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Timestamp = DateTime<Utc>;

/// A session's place in the build → operator → worker → test hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Build,
    Operator,
    Worker,
    Test,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Build => "build",
            SessionType::Operator => "operator",
            SessionType::Worker => "worker",
            SessionType::Test => "test",
        }
    }
}

impl std::str::FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(SessionType::Build),
            "operator" => Ok(SessionType::Operator),
            "worker" => Ok(SessionType::Worker),
            "test" => Ok(SessionType::Test),
            other => Err(format!("unknown session type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Compacted,
    Complete,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Complete | SessionStatus::Failed | SessionStatus::Compacted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Compacted => "compacted",
            SessionStatus::Complete => "complete",
            SessionStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(SessionStatus::Running),
            "compacted" => Ok(SessionStatus::Compacted),
            "complete" => Ok(SessionStatus::Complete),
            "failed" => Ok(SessionStatus::Failed),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

/// A conversation with an agent, positioned in a project-wide session tree.
///
/// Invariants enforced by the Session Engine rather than this struct:
/// `depth(parent) + 1 = depth(self)`, `root = self` iff `depth = 0`,
/// a session not `running` has `ended_at` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub session_type: SessionType,
    pub depth: i64,
    pub parent_id: Option<String>,
    pub root_id: String,
    pub project_root: String,
    pub linked_port_id: Option<String>,
    pub agent_id: Option<String>,
    pub token_budget: i64,
    pub tokens_used: i64,
    pub cumulative_cost: f64,
    pub status: SessionStatus,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
}

impl Session {
    pub fn budget_fraction(&self) -> f64 {
        if self.token_budget <= 0 {
            0.0
        } else {
            self.tokens_used as f64 / self.token_budget as f64
        }
    }
}

/// Append-only record of something that happened inside a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: i64,
    pub session_id: String,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub created_at: Timestamp,
}

/// Well-known event-type strings. Callers may log arbitrary additional types;
/// these are the ones the engine itself emits.
pub mod event_type {
    pub const SESSION_START: &str = "session-start";
    pub const SESSION_END: &str = "session-end";
    pub const PORT_START: &str = "port-start";
    pub const PORT_END: &str = "port-end";
    pub const COMPACT: &str = "compact";
    pub const DECISION: &str = "decision";
    pub const ERROR: &str = "error";
    pub const WARNING: &str = "warning";
}

/// Options accepted by `SessionEngine::start_hierarchical`.
#[derive(Debug, Clone, Default)]
pub struct StartSessionOptions {
    pub id: Option<String>,
    pub title: String,
    pub session_type: Option<SessionType>,
    pub parent_id: Option<String>,
    pub project_root: String,
    pub linked_port_id: Option<String>,
    pub agent_id: Option<String>,
    pub token_budget: i64,
}

/// A recorded context compaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactEvent {
    pub id: i64,
    pub session_id: String,
    pub trigger_reason: String,
    pub before_tokens: i64,
    pub after_tokens: i64,
    pub preserved_context: Vec<String>,
    pub occurred_at: Timestamp,
}
