use core_store::Database;
use core_types::{
    event_type, Checkpoint, DomainError, NewCheckpoint, PortStatus, RecoveryContext,
};

use crate::error::{store_err, Result};

/// Snapshots state per session and synthesizes resumption prompts.
pub struct CheckpointService<'a> {
    db: &'a Database,
}

impl<'a> CheckpointService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create(&self, new: &NewCheckpoint) -> Result<Checkpoint> {
        let session = self
            .db
            .get_session(&new.session_id)
            .map_err(store_err)?
            .ok_or_else(|| DomainError::not_found(format!("session '{}'", new.session_id)))?;

        self.db
            .create_checkpoint(new, session.tokens_used, session.token_budget)
            .map_err(store_err)
    }

    pub fn latest(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        self.db.latest_checkpoint(session_id).map_err(store_err)
    }

    /// Synthesize the structured input to the §6.2 Markdown renderer:
    /// latest checkpoint, the most recently `running` port, a coarse
    /// progress string, pending tasks, recent files, and the last five
    /// `decision` events.
    pub fn generate_recovery_context(&self, session_id: &str) -> Result<RecoveryContext> {
        let checkpoint = self.latest(session_id)?;

        let ports = self
            .db
            .list_ports(None, Some(PortStatus::Running))
            .map_err(store_err)?;
        let active_port = ports
            .into_iter()
            .filter(|p| p.linked_session_id.as_deref() == Some(session_id))
            .max_by_key(|p| p.updated_at);

        let summary = self
            .db
            .port_summary(active_port.as_ref().and_then(|p| p.pipeline_id.as_deref()))
            .map_err(store_err)?;
        let progress = format!(
            "{} complete, {} running, {} pending, {} blocked, {} failed",
            summary.complete, summary.running, summary.pending, summary.blocked, summary.failed
        );

        let pending_tasks = active_port
            .as_ref()
            .and_then(|p| p.file.as_ref())
            .and_then(|path| std::fs::read_to_string(path).ok())
            .map(|text| extract_checklist(&text))
            .unwrap_or_default();

        let mut decision_events = self
            .db
            .session_events(session_id)
            .map_err(store_err)?
            .into_iter()
            .filter(|e| e.event_type == event_type::DECISION)
            .collect::<Vec<_>>();
        decision_events.reverse();
        decision_events.truncate(5);
        let decisions = decision_events
            .into_iter()
            .map(|e| {
                e.event_data
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            })
            .filter(|s| !s.is_empty())
            .collect();

        let session = self
            .db
            .get_session(session_id)
            .map_err(store_err)?
            .ok_or_else(|| DomainError::not_found(format!("session '{session_id}'")))?;

        Ok(RecoveryContext {
            checkpoint_id: checkpoint.as_ref().map(|c| c.id.clone()),
            summary: checkpoint.as_ref().map(|c| c.summary.clone()).unwrap_or_default(),
            active_port_title: active_port.map(|p| p.title),
            progress,
            pending_tasks,
            active_files: checkpoint.map(|c| c.active_files).unwrap_or_default(),
            decisions,
            cumulative_tokens: session.tokens_used,
        })
    }
}

fn extract_checklist(spec_text: &str) -> Vec<String> {
    spec_text
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            trimmed.strip_prefix("- [ ]").map(|rest| rest.trim().to_string())
        })
        .collect()
}

/// Render the fixed-format §6.2 Markdown recovery prompt. Sections with no
/// content are omitted; output is byte-equivalent for byte-equivalent input.
pub fn render_recovery_prompt(ctx: &RecoveryContext) -> String {
    let mut out = String::new();
    out.push_str("## Compact 복구\n\n");

    if !ctx.summary.is_empty() {
        out.push_str(&format!("**마지막 상태:** {}\n", ctx.summary));
    }
    if let Some(title) = &ctx.active_port_title {
        out.push_str(&format!("**활성 포트:** {title}\n"));
    }
    if !ctx.progress.is_empty() {
        out.push_str(&format!("**진행 상황:** {}\n", ctx.progress));
    }
    if !ctx.pending_tasks.is_empty() {
        out.push_str("**남은 작업:**\n");
        for task in &ctx.pending_tasks {
            out.push_str(&format!("- [ ] {task}\n"));
        }
    }
    if !ctx.active_files.is_empty() {
        out.push_str("**최근 수정 파일:**\n");
        for file in &ctx.active_files {
            out.push_str(&format!("- {file}\n"));
        }
    }
    if !ctx.decisions.is_empty() {
        out.push_str("**주요 결정:**\n");
        for decision in &ctx.decisions {
            out.push_str(&format!("- {decision}\n"));
        }
    }

    out.push('\n');
    out.push_str("위 컨텍스트를 참고하여 작업을 계속하세요.\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_snapshots_session_token_counters() {
        let db = Database::open_in_memory().unwrap();
        let session = core_types::Session {
            id: "s1".to_string(),
            title: "worker".to_string(),
            session_type: core_types::SessionType::Worker,
            depth: 0,
            parent_id: None,
            root_id: "s1".to_string(),
            project_root: "/tmp".to_string(),
            linked_port_id: None,
            agent_id: None,
            token_budget: 10_000,
            tokens_used: 5_000,
            cumulative_cost: 0.1,
            status: core_types::SessionStatus::Running,
            started_at: chrono::Utc::now(),
            ended_at: None,
        };
        db.insert_session(&session).unwrap();

        let service = CheckpointService::new(&db);
        let checkpoint = service
            .create(&NewCheckpoint {
                session_id: "s1".to_string(),
                port_id: None,
                summary: "made progress".to_string(),
                active_files: vec!["src/lib.rs".to_string()],
                key_points: vec![],
            })
            .unwrap();
        assert_eq!(checkpoint.tokens_used, 5_000);
        assert_eq!(checkpoint.token_budget, 10_000);
    }

    #[test]
    fn renders_only_populated_sections() {
        let ctx = RecoveryContext {
            checkpoint_id: Some("ckpt_1".to_string()),
            summary: "finished the parser".to_string(),
            active_port_title: None,
            progress: String::new(),
            pending_tasks: vec![],
            active_files: vec![],
            decisions: vec![],
            cumulative_tokens: 1000,
        };
        let rendered = render_recovery_prompt(&ctx);
        assert!(rendered.contains("## Compact 복구"));
        assert!(rendered.contains("마지막 상태:** finished the parser"));
        assert!(!rendered.contains("활성 포트"));
        assert!(!rendered.contains("남은 작업"));
        assert!(rendered.ends_with("위 컨텍스트를 참고하여 작업을 계속하세요.\n"));
    }

    #[test]
    fn renders_all_sections_when_populated() {
        let ctx = RecoveryContext {
            checkpoint_id: Some("ckpt_1".to_string()),
            summary: "finished the parser".to_string(),
            active_port_title: Some("implement lexer".to_string()),
            progress: "1 complete, 1 running".to_string(),
            pending_tasks: vec!["write tests".to_string()],
            active_files: vec!["src/lexer.rs".to_string()],
            decisions: vec!["use recursive descent".to_string()],
            cumulative_tokens: 1000,
        };
        let rendered = render_recovery_prompt(&ctx);
        assert!(rendered.contains("활성 포트:** implement lexer"));
        assert!(rendered.contains("- [ ] write tests"));
        assert!(rendered.contains("- src/lexer.rs"));
        assert!(rendered.contains("- use recursive descent"));
    }
}
