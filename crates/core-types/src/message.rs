use serde::{Deserialize, Serialize};

use crate::session::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Request,
    Response,
    Report,
    Escalation,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Request => "request",
            MessageType::Response => "response",
            MessageType::Report => "report",
            MessageType::Escalation => "escalation",
        }
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request" => Ok(MessageType::Request),
            "response" => Ok(MessageType::Response),
            "report" => Ok(MessageType::Report),
            "escalation" => Ok(MessageType::Escalation),
            other => Err(format!("unknown message type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Delivered,
    Processed,
    Expired,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Processed => "processed",
            MessageStatus::Expired => "expired",
        }
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "delivered" => Ok(MessageStatus::Delivered),
            "processed" => Ok(MessageStatus::Processed),
            "expired" => Ok(MessageStatus::Expired),
            other => Err(format!("unknown message status '{other}'")),
        }
    }
}

pub const DEFAULT_PRIORITY: i64 = 5;

/// A unit of inter-session communication.
///
/// `to_session = None` means "broadcast": any descendant of `from_session`
/// may consume it, and it is delivered to every `receive` caller until one of
/// them marks it `processed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub from_session: String,
    pub to_session: Option<String>,
    pub message_type: MessageType,
    pub subtype: String,
    pub payload: serde_json::Value,
    pub attention_score: Option<f64>,
    pub token_count: Option<i64>,
    pub cumulative_tokens: Option<i64>,
    pub status: MessageStatus,
    pub created_at: Timestamp,
    pub processed_at: Option<Timestamp>,
    pub port_id: Option<String>,
    pub priority: i64,
}

/// Fields a caller supplies to `MessageBus::send`; id/created-at/priority are
/// defaulted by the bus per §4.5.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Option<String>,
    pub conversation_id: String,
    pub from_session: String,
    pub to_session: Option<String>,
    pub message_type: MessageType,
    pub subtype: String,
    pub payload: serde_json::Value,
    pub token_count: Option<i64>,
    pub cumulative_tokens: Option<i64>,
    pub port_id: Option<String>,
    pub priority: Option<i64>,
}

/// Canonical payload shapes from §6.4. Unknown subtypes bypass these and are
/// stored as opaque `serde_json::Value`.
pub mod payloads {
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TaskAssign {
        pub port_id: String,
        pub port_spec: String,
        #[serde(default)]
        pub conventions: Vec<String>,
        #[serde(default)]
        pub context: Option<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TaskReport {
        pub status: String,
        #[serde(default)]
        pub output: HashMap<String, serde_json::Value>,
        #[serde(default)]
        pub metrics: HashMap<String, serde_json::Value>,
        #[serde(default)]
        pub error: Option<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ImplReady {
        pub files: Vec<String>,
        pub changes_summary: String,
        pub build_status: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TestResult {
        pub passed: u32,
        pub failed: u32,
        #[serde(default)]
        pub coverage_percent: Option<f64>,
        #[serde(default)]
        pub feedback: Option<String>,
        #[serde(default)]
        pub failures: Vec<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct FixRequest {
        pub failures: Vec<String>,
        #[serde(default)]
        pub suggestions: Vec<String>,
    }
}

/// Well-known message subtypes named in §6.4. Any other string is a valid,
/// opaquely-forwarded subtype.
pub mod subtype {
    pub const TASK_ASSIGN: &str = "task_assign";
    pub const TASK_COMPLETE: &str = "task_complete";
    pub const TASK_FAILED: &str = "task_failed";
    pub const TASK_BLOCKED: &str = "task_blocked";
    pub const IMPL_READY: &str = "impl_ready";
    pub const TEST_PASS: &str = "test_pass";
    pub const TEST_FAIL: &str = "test_fail";
    pub const FIX_REQUEST: &str = "fix_request";
}
