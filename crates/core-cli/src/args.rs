// Namespaced, not flat: one subcommand enum per noun (session, port,
// pipeline, lock, message, escalation, config, env), each with its own leaf
// subcommand enum.

use clap::{Parser, Subcommand, ValueEnum};
use core_types::{EscalationStatus, PortStatus, SessionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Parser)]
#[command(name = "port")]
#[command(about = "Orchestration engine for hierarchical agent sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Project root to operate against. Defaults to the current directory.
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[arg(long, value_enum, default_value = "plain", global = true)]
    pub format: OutputFormat,

    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Initialize a project's .port data directory")]
    Init,

    #[command(about = "Aggregated dashboard across ports, escalations, and locks")]
    Status,

    #[command(subcommand, about = "Session lifecycle: start, end, list, tree, events")]
    Session(SessionCommand),

    #[command(subcommand, about = "Port lifecycle: create, list, show, status, delete")]
    Port(PortCommand),

    #[command(subcommand, about = "Pipelines: ordered collections of ports")]
    Pipeline(PipelineCommand),

    #[command(subcommand, about = "Named resource locks")]
    Lock(LockCommand),

    #[command(subcommand, about = "Inter-session messages")]
    Message(MessageCommand),

    #[command(subcommand, about = "Checkpoints, recovery prompts, and compaction detection")]
    Checkpoint(CheckpointCommand),

    #[command(subcommand, about = "Human-resolvable escalations")]
    Escalation(EscalationCommand),

    #[command(subcommand, about = "Per-project configuration")]
    Config(ConfigCommand),

    #[command(subcommand, about = "Environment profiles (multi-host setups)")]
    Env(EnvCommand),
}

#[derive(Subcommand)]
pub enum SessionCommand {
    Start {
        #[arg(long)]
        title: String,
        #[arg(long, value_enum)]
        session_type: Option<SessionTypeArg>,
        #[arg(long)]
        parent_id: Option<String>,
        #[arg(long)]
        linked_port_id: Option<String>,
        #[arg(long)]
        token_budget: Option<i64>,
    },
    End {
        id: String,
        #[arg(long, value_enum, default_value = "complete")]
        status: TerminalStatusArg,
        #[arg(long, default_value = "")]
        reason: String,
    },
    List,
    Tree {
        root_id: String,
    },
    Events {
        id: String,
        #[arg(long)]
        event_type: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    #[command(about = "Scan an agent transcript file and record its token usage and cost")]
    SyncUsage {
        id: String,
        #[arg(long)]
        transcript: String,
    },
    #[command(about = "Record a compaction and reset tokens-used to the post-compaction value")]
    Compact {
        id: String,
        #[arg(long)]
        trigger: String,
        #[arg(long, default_value_t = 0)]
        after_tokens: i64,
        #[arg(long, value_delimiter = ',')]
        preserved: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SessionTypeArg {
    Build,
    Operator,
    Worker,
    Test,
}

impl From<SessionTypeArg> for core_types::SessionType {
    fn from(value: SessionTypeArg) -> Self {
        match value {
            SessionTypeArg::Build => core_types::SessionType::Build,
            SessionTypeArg::Operator => core_types::SessionType::Operator,
            SessionTypeArg::Worker => core_types::SessionType::Worker,
            SessionTypeArg::Test => core_types::SessionType::Test,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TerminalStatusArg {
    Complete,
    Failed,
    Compacted,
}

impl From<TerminalStatusArg> for SessionStatus {
    fn from(value: TerminalStatusArg) -> Self {
        match value {
            TerminalStatusArg::Complete => SessionStatus::Complete,
            TerminalStatusArg::Failed => SessionStatus::Failed,
            TerminalStatusArg::Compacted => SessionStatus::Compacted,
        }
    }
}

#[derive(Subcommand)]
pub enum PortCommand {
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        pipeline_id: Option<String>,
        #[arg(long, value_delimiter = ',')]
        depends_on: Vec<String>,
    },
    List {
        #[arg(long)]
        pipeline_id: Option<String>,
        #[arg(long, value_enum)]
        status: Option<PortStatusArg>,
    },
    Show {
        id: String,
    },
    Status {
        id: String,
        #[arg(value_enum)]
        status: PortStatusArg,
        #[arg(long)]
        session_id: Option<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PortStatusArg {
    Pending,
    Running,
    Blocked,
    Complete,
    Failed,
}

impl From<PortStatusArg> for PortStatus {
    fn from(value: PortStatusArg) -> Self {
        match value {
            PortStatusArg::Pending => PortStatus::Pending,
            PortStatusArg::Running => PortStatus::Running,
            PortStatusArg::Blocked => PortStatus::Blocked,
            PortStatusArg::Complete => PortStatus::Complete,
            PortStatusArg::Failed => PortStatus::Failed,
        }
    }
}

#[derive(Subcommand)]
pub enum PipelineCommand {
    Create {
        name: String,
    },
    List,
    Show {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum LockCommand {
    Acquire { resource: String, session_id: String },
    Release { resource: String, session_id: String },
    List,
}

#[derive(Subcommand)]
pub enum MessageCommand {
    Send {
        #[arg(long)]
        conversation_id: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        subtype: String,
        #[arg(long)]
        payload: String,
        #[arg(long)]
        priority: Option<i64>,
    },
    Receive {
        session_id: String,
        #[arg(long)]
        limit: Option<i64>,
    },
    MarkProcessed {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum CheckpointCommand {
    #[command(about = "Take a checkpoint unconditionally")]
    Create {
        session_id: String,
        #[arg(long)]
        port_id: Option<String>,
        #[arg(long, default_value = "")]
        summary: String,
        #[arg(long, value_delimiter = ',')]
        active_files: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        key_points: Vec<String>,
    },
    #[command(about = "Take a checkpoint only if the policy (80% budget + event horizon) says one is due")]
    IfDue {
        session_id: String,
        #[arg(long)]
        port_id: Option<String>,
        #[arg(long, default_value = "")]
        summary: String,
        #[arg(long, value_delimiter = ',')]
        active_files: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        key_points: Vec<String>,
    },
    #[command(about = "Render the Markdown recovery prompt for a session's latest checkpoint")]
    RecoveryPrompt { session_id: String },
    #[command(about = "Test whether text matches the fixed compaction vocabulary")]
    DetectCompact { text: String },
}

#[derive(Subcommand)]
pub enum EscalationCommand {
    Open {
        #[arg(long)]
        session_id: Option<String>,
        issue: String,
    },
    Resolve {
        id: i64,
    },
    List {
        #[arg(long, value_enum)]
        status: Option<EscalationStatusArg>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EscalationStatusArg {
    Open,
    Resolved,
    Dismissed,
}

impl From<EscalationStatusArg> for EscalationStatus {
    fn from(value: EscalationStatusArg) -> Self {
        match value {
            EscalationStatusArg::Open => EscalationStatus::Open,
            EscalationStatusArg::Resolved => EscalationStatus::Resolved,
            EscalationStatusArg::Dismissed => EscalationStatus::Dismissed,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    Get { key: String },
    Set { key: String, value: String },
}

#[derive(Subcommand)]
pub enum EnvCommand {
    Setup {
        name: String,
        #[arg(long)]
        workspace_path: String,
        #[arg(long)]
        agent_data_path: String,
        #[arg(long)]
        home_path: String,
    },
    Switch {
        name: String,
    },
    Detect,
}
