use serde::{Deserialize, Serialize};

use crate::session::Timestamp;

/// A durable snapshot of an in-flight session, suitable for regenerating a
/// recovery prompt after compaction or a process restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub session_id: String,
    pub port_id: Option<String>,
    pub summary: String,
    pub active_files: Vec<String>,
    pub key_points: Vec<String>,
    pub tokens_used: i64,
    pub token_budget: i64,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub struct NewCheckpoint {
    pub session_id: String,
    pub port_id: Option<String>,
    pub summary: String,
    pub active_files: Vec<String>,
    pub key_points: Vec<String>,
}

/// Structured input to §6.2's recovery-prompt renderer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryContext {
    pub checkpoint_id: Option<String>,
    pub summary: String,
    pub active_port_title: Option<String>,
    pub progress: String,
    pub pending_tasks: Vec<String>,
    pub active_files: Vec<String>,
    pub decisions: Vec<String>,
    pub cumulative_tokens: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Open,
    Resolved,
    Dismissed,
}

impl EscalationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationStatus::Open => "open",
            EscalationStatus::Resolved => "resolved",
            EscalationStatus::Dismissed => "dismissed",
        }
    }
}

impl std::str::FromStr for EscalationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(EscalationStatus::Open),
            "resolved" => Ok(EscalationStatus::Resolved),
            "dismissed" => Ok(EscalationStatus::Dismissed),
            other => Err(format!("unknown escalation status '{other}'")),
        }
    }
}

/// An open issue awaiting human action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    pub id: i64,
    pub session_id: Option<String>,
    pub issue: String,
    pub status: EscalationStatus,
    pub created_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscalationSummary {
    pub open: i64,
    pub resolved: i64,
    pub dismissed: i64,
}

/// Checkpoint-policy verdict returned by the Attention Monitor's
/// `record_usage`, so callers can log a `warning` event without re-deriving
/// the 80%/100% thresholds themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Nominal,
    Warning,
    Exhausted,
}
