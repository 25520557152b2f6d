use std::path::PathBuf;

use core_runtime::{Config, ProfileStore, Workspace};
use core_types::{EnvironmentProfile, MessageType, NewCheckpoint, NewMessage, StartSessionOptions};

use crate::args::*;
use crate::error::{Error, Result};
use crate::output::{emit_error, emit_success};

fn project_root(cli: &Cli) -> PathBuf {
    match &cli.data_dir {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Run the CLI end to end and return the process exit code, per §6.3/§7:
/// 0 on success, the domain-error-kind-derived code otherwise.
pub async fn run(cli: Cli) -> i32 {
    let format = cli.format;
    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => emit_error(format, &err),
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let format = cli.format;
    let root = project_root(&cli);

    if matches!(cli.command, Commands::Init) {
        let workspace = Workspace::open(&root)?;
        let released = workspace.sweep_crashed_locks().await?;
        emit_success(format, &serde_json::json!({ "data_dir": workspace.data_dir(), "swept_locks": released }), || {
            format!("Initialized {} (swept {} stale lock(s))", workspace.data_dir().display(), released)
        });
        return Ok(());
    }

    if let Commands::Env(command) = cli.command {
        return run_env(format, command);
    }

    let workspace = Workspace::open(&root)?;
    workspace.sweep_crashed_locks().await?;

    match cli.command {
        Commands::Init | Commands::Env(_) => unreachable!("handled above"),
        Commands::Status => run_status(format, &workspace).await,
        Commands::Session(command) => run_session(format, &workspace, &root, command).await,
        Commands::Port(command) => run_port(format, &workspace, command).await,
        Commands::Pipeline(command) => run_pipeline(format, &workspace, command).await,
        Commands::Lock(command) => run_lock(format, &workspace, command).await,
        Commands::Message(command) => run_message(format, &workspace, command).await,
        Commands::Checkpoint(command) => run_checkpoint(format, &workspace, command).await,
        Commands::Escalation(command) => run_escalation(format, &workspace, command).await,
        Commands::Config(command) => run_config(format, &workspace, command),
    }
}

async fn run_status(format: OutputFormat, workspace: &Workspace) -> Result<()> {
    let ports = workspace.port_summary(None).await?;
    let escalations = workspace.escalation_summary().await?;
    let locks = workspace.list_locks().await?;

    emit_success(
        format,
        &serde_json::json!({ "ports": ports, "escalations": escalations, "active_locks": locks.len() }),
        || {
            format!(
                "ports: {} pending / {} running / {} blocked / {} complete\nescalations open: {}\nactive locks: {}",
                ports.pending, ports.running, ports.blocked, ports.complete, escalations.open, locks.len()
            )
        },
    );
    Ok(())
}

async fn run_session(
    format: OutputFormat,
    workspace: &Workspace,
    root: &std::path::Path,
    command: SessionCommand,
) -> Result<()> {
    match command {
        SessionCommand::Start { title, session_type, parent_id, linked_port_id, token_budget } => {
            let session = workspace
                .start_session(StartSessionOptions {
                    id: None,
                    title,
                    session_type: session_type.map(Into::into),
                    parent_id,
                    project_root: root.to_string_lossy().to_string(),
                    linked_port_id,
                    agent_id: None,
                    token_budget: token_budget.unwrap_or(workspace.config().default_token_budget),
                })
                .await?;
            emit_success(format, &session, || format!("started session {}", session.id));
        }
        SessionCommand::End { id, status, reason } => {
            workspace.end_session(id.clone(), status.into(), reason).await?;
            emit_success(format, &serde_json::json!({ "id": id }), || format!("ended session {id}"));
        }
        SessionCommand::List => {
            let sessions = workspace.list_sessions(None, None).await?;
            emit_success(format, &sessions, || {
                sessions.iter().map(|s| format!("{} [{}] {}", s.id, s.status.as_str(), s.title)).collect::<Vec<_>>().join("\n")
            });
        }
        SessionCommand::Tree { root_id } => {
            let sessions = workspace.session_tree(root_id).await?;
            emit_success(format, &sessions, || {
                sessions
                    .iter()
                    .map(|s| format!("{}{} [{}] {}", "  ".repeat(s.depth as usize), s.id, s.status.as_str(), s.title))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        SessionCommand::Events { id, event_type, limit } => {
            let events = workspace.session_events(id, event_type, limit).await?;
            emit_success(format, &events, || {
                events.iter().map(|e| format!("{} {} {}", e.created_at, e.event_type, e.event_data)).collect::<Vec<_>>().join("\n")
            });
        }
        SessionCommand::SyncUsage { id, transcript } => {
            let status = workspace.sync_usage_from_transcript(id, PathBuf::from(transcript)).await?;
            emit_success(format, &status, || format!("{status:?}"));
        }
        SessionCommand::Compact { id, trigger, after_tokens, preserved } => {
            let session = workspace.compact_session(id, trigger, preserved, after_tokens).await?;
            emit_success(format, &session, || {
                format!("compacted session {} to {} tokens", session.id, session.tokens_used)
            });
        }
    }
    Ok(())
}

async fn run_port(format: OutputFormat, workspace: &Workspace, command: PortCommand) -> Result<()> {
    match command {
        PortCommand::Create { title, file, pipeline_id, depends_on } => {
            let port = workspace.create_port(pipeline_id, title, file, depends_on).await?;
            emit_success(format, &port, || format!("created port {} ({})", port.id, port.title));
        }
        PortCommand::List { pipeline_id, status } => {
            let ports = workspace.list_ports(pipeline_id, status.map(Into::into)).await?;
            emit_success(format, &ports, || {
                ports.iter().map(|p| format!("{} [{}] {}", p.id, p.status.as_str(), p.title)).collect::<Vec<_>>().join("\n")
            });
        }
        PortCommand::Show { id } => {
            let port = workspace.get_port(id).await?;
            emit_success(format, &port, || format!("{} [{}] {}", port.id, port.status.as_str(), port.title));
        }
        PortCommand::Status { id, status, session_id } => {
            let port = workspace.update_port_status(id, status.into(), session_id).await?;
            emit_success(format, &port, || format!("{} is now {}", port.id, port.status.as_str()));
        }
        PortCommand::Delete { id } => {
            workspace.delete_port(id.clone()).await?;
            emit_success(format, &serde_json::json!({ "id": id }), || format!("deleted port {id}"));
        }
    }
    Ok(())
}

async fn run_pipeline(format: OutputFormat, workspace: &Workspace, command: PipelineCommand) -> Result<()> {
    match command {
        PipelineCommand::Create { name } => {
            let pipeline = workspace.create_pipeline(None, name).await?;
            emit_success(format, &pipeline, || format!("created pipeline {} ({})", pipeline.id, pipeline.name));
        }
        PipelineCommand::List => {
            let pipelines = workspace.list_pipelines().await?;
            emit_success(format, &pipelines, || {
                pipelines.iter().map(|p| format!("{} [{}] {}", p.id, pipeline_status_str(p.status), p.name)).collect::<Vec<_>>().join("\n")
            });
        }
        PipelineCommand::Show { id } => {
            let progress = workspace.pipeline_progress(id.clone()).await?;
            match progress {
                Some(progress) => emit_success(format, &progress, || {
                    format!("{}/{} ports complete", progress.complete, progress.total)
                }),
                None => return Err(Error::from(core_runtime::Error::InvalidOperation(format!("no pipeline '{id}'")))),
            }
        }
    }
    Ok(())
}

async fn run_lock(format: OutputFormat, workspace: &Workspace, command: LockCommand) -> Result<()> {
    match command {
        LockCommand::Acquire { resource, session_id } => {
            workspace.acquire_lock(resource.clone(), session_id.clone()).await?;
            emit_success(format, &serde_json::json!({ "resource": resource, "session_id": session_id }), || {
                format!("{session_id} acquired '{resource}'")
            });
        }
        LockCommand::Release { resource, session_id } => {
            workspace.release_lock(resource.clone(), session_id).await?;
            emit_success(format, &serde_json::json!({ "resource": resource }), || format!("released '{resource}'"));
        }
        LockCommand::List => {
            let locks = workspace.list_locks().await?;
            emit_success(format, &locks, || {
                locks.iter().map(|l| format!("{} held by {}", l.resource, l.session_id)).collect::<Vec<_>>().join("\n")
            });
        }
    }
    Ok(())
}

async fn run_message(format: OutputFormat, workspace: &Workspace, command: MessageCommand) -> Result<()> {
    match command {
        MessageCommand::Send { conversation_id, from, to, subtype, payload, priority } => {
            let payload: serde_json::Value = serde_json::from_str(&payload)?;
            let message = workspace
                .send_message(NewMessage {
                    id: None,
                    conversation_id: conversation_id.clone(),
                    from_session: from,
                    to_session: to,
                    message_type: MessageType::Request,
                    subtype,
                    payload,
                    token_count: None,
                    cumulative_tokens: None,
                    port_id: Some(conversation_id),
                    priority,
                })
                .await?;
            emit_success(format, &message, || format!("sent message {}", message.id));
        }
        MessageCommand::Receive { session_id, limit } => {
            let messages = workspace.receive_messages(session_id, limit).await?;
            emit_success(format, &messages, || {
                messages.iter().map(|m| format!("{} [{}] {}", m.id, m.subtype, m.payload)).collect::<Vec<_>>().join("\n")
            });
        }
        MessageCommand::MarkProcessed { id } => {
            workspace.mark_message_processed(id.clone()).await?;
            emit_success(format, &serde_json::json!({ "id": id }), || format!("marked {id} processed"));
        }
    }
    Ok(())
}

async fn run_checkpoint(format: OutputFormat, workspace: &Workspace, command: CheckpointCommand) -> Result<()> {
    match command {
        CheckpointCommand::Create { session_id, port_id, summary, active_files, key_points } => {
            let checkpoint = workspace
                .checkpoint_now(NewCheckpoint { session_id, port_id, summary, active_files, key_points })
                .await?;
            emit_success(format, &checkpoint, || format!("checkpoint {} taken", checkpoint.id));
        }
        CheckpointCommand::IfDue { session_id, port_id, summary, active_files, key_points } => {
            let checkpoint = workspace
                .checkpoint_if_due(NewCheckpoint { session_id, port_id, summary, active_files, key_points })
                .await?;
            emit_success(format, &checkpoint, || match &checkpoint {
                Some(c) => format!("checkpoint {} taken", c.id),
                None => "no checkpoint due".to_string(),
            });
        }
        CheckpointCommand::RecoveryPrompt { session_id } => {
            let prompt = workspace.recovery_prompt(session_id).await?;
            emit_success(format, &serde_json::json!({ "prompt": prompt }), || prompt.clone());
        }
        CheckpointCommand::DetectCompact { text } => {
            let detected = workspace.detect_compact(&text);
            emit_success(format, &serde_json::json!({ "detected": detected }), || detected.to_string());
        }
    }
    Ok(())
}

async fn run_escalation(format: OutputFormat, workspace: &Workspace, command: EscalationCommand) -> Result<()> {
    match command {
        EscalationCommand::Open { session_id, issue } => {
            let escalation = workspace.open_escalation(session_id, issue).await?;
            emit_success(format, &escalation, || format!("opened escalation #{}", escalation.id));
        }
        EscalationCommand::Resolve { id } => {
            workspace.resolve_escalation(id).await?;
            emit_success(format, &serde_json::json!({ "id": id }), || format!("resolved escalation #{id}"));
        }
        EscalationCommand::List { status } => {
            let escalations = workspace.list_escalations(status.map(Into::into)).await?;
            emit_success(format, &escalations, || {
                escalations.iter().map(|e| format!("#{} [{}] {}", e.id, e.status.as_str(), e.issue)).collect::<Vec<_>>().join("\n")
            });
        }
    }
    Ok(())
}

fn run_config(format: OutputFormat, workspace: &Workspace, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Get { key } => {
            let value = config_field(workspace.config(), &key)?;
            emit_success(format, &serde_json::json!({ key.clone(): value }), || format!("{key} = {value}"));
        }
        ConfigCommand::Set { key, value } => {
            let mut config = workspace.config().clone();
            set_config_field(&mut config, &key, &value)?;
            config.save_to(&workspace.data_dir().join("config.toml"))?;
            emit_success(format, &serde_json::json!({ key.clone(): value }), || format!("{key} = {value}"));
        }
    }
    Ok(())
}

fn config_field(config: &Config, key: &str) -> Result<String> {
    match key {
        "default_token_budget" => Ok(config.default_token_budget.to_string()),
        "message_expiry_secs" => Ok(config.message_expiry_secs.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string())),
        "checkpoint_event_horizon" => Ok(config.checkpoint_event_horizon.to_string()),
        other => Err(Error::from(core_runtime::Error::InvalidOperation(format!("unknown config key '{other}'")))),
    }
}

fn set_config_field(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "default_token_budget" => {
            config.default_token_budget = value
                .parse()
                .map_err(|_| Error::from(core_runtime::Error::InvalidOperation(format!("invalid integer '{value}'"))))?;
        }
        "message_expiry_secs" => {
            config.message_expiry_secs = if value == "none" {
                None
            } else {
                Some(value.parse().map_err(|_| {
                    Error::from(core_runtime::Error::InvalidOperation(format!("invalid integer '{value}'")))
                })?)
            };
        }
        "checkpoint_event_horizon" => {
            config.checkpoint_event_horizon = value
                .parse()
                .map_err(|_| Error::from(core_runtime::Error::InvalidOperation(format!("invalid integer '{value}'"))))?;
        }
        other => return Err(Error::from(core_runtime::Error::InvalidOperation(format!("unknown config key '{other}'")))),
    }
    Ok(())
}

fn pipeline_status_str(status: core_types::PipelineStatus) -> &'static str {
    use core_types::PipelineStatus::*;
    match status {
        Pending => "pending",
        Running => "running",
        Complete => "complete",
        Failed => "failed",
    }
}

fn run_env(format: OutputFormat, command: EnvCommand) -> Result<()> {
    let store = ProfileStore::default_location()?;
    match command {
        EnvCommand::Setup { name, workspace_path, agent_data_path, home_path } => {
            let profile = EnvironmentProfile {
                name: name.clone(),
                hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string()),
                workspace_path,
                agent_data_path,
                home_path,
                projects: Default::default(),
                docs_vaults: Default::default(),
                match_rules: vec![],
                last_active_at: None,
            };
            store.upsert(profile)?;
            emit_success(format, &serde_json::json!({ "name": name }), || format!("profile '{name}' saved"));
        }
        EnvCommand::Switch { name } => {
            let profile = store.switch(&name)?;
            emit_success(format, &profile, || format!("switched to profile '{}'", profile.name));
        }
        EnvCommand::Detect => match store.detect()? {
            Some(profile) => emit_success(format, &profile, || format!("detected profile '{}'", profile.name)),
            None => emit_success(format, &serde_json::Value::Null, || "no profile matched this host".to_string()),
        },
    }
    Ok(())
}
