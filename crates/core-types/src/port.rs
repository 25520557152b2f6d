use serde::{Deserialize, Serialize};

use crate::session::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortStatus {
    Pending,
    Running,
    Blocked,
    Complete,
    Failed,
}

impl PortStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortStatus::Pending => "pending",
            PortStatus::Running => "running",
            PortStatus::Blocked => "blocked",
            PortStatus::Complete => "complete",
            PortStatus::Failed => "failed",
        }
    }

    /// True when `self -> next` is an edge of the state machine in §4.2.
    pub fn can_transition_to(&self, next: PortStatus) -> bool {
        use PortStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Running, Complete)
                | (Running, Blocked)
                | (Running, Failed)
                | (Blocked, Running)
                // idempotent no-op, handled specially by the engine
                | (Blocked, Blocked)
        )
    }
}

impl std::str::FromStr for PortStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PortStatus::Pending),
            "running" => Ok(PortStatus::Running),
            "blocked" => Ok(PortStatus::Blocked),
            "complete" => Ok(PortStatus::Complete),
            "failed" => Ok(PortStatus::Failed),
            other => Err(format!("unknown port status '{other}'")),
        }
    }
}

/// A dependency-ordered unit of work backed by a spec file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub title: String,
    pub file: Option<String>,
    pub status: PortStatus,
    pub pipeline_id: Option<String>,
    pub linked_session_id: Option<String>,
    pub estimated_tokens: Option<i64>,
    pub estimated_cost: Option<f64>,
    pub estimated_duration_secs: Option<i64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Roll-up used by `PortEngine::summary`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortSummary {
    pub pending: i64,
    pub running: i64,
    pub blocked: i64,
    pub complete: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    pub status: PipelineStatus,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub pipeline: Pipeline,
    pub complete: i64,
    pub total: i64,
}

/// A named exclusive resource handle held by a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    pub resource: String,
    pub session_id: String,
    pub acquired_at: Timestamp,
}
