use core_store::Database;
use core_types::{
    event_type, new_id, DomainError, DomainErrorKind, Session, SessionStatus, SessionType,
    StartSessionOptions,
};

use crate::error::{store_err, Result};

/// Hierarchical session lifecycle: create, log events against, end, and
/// compact a session, plus the read-only tree projections named in §4.4.
pub struct SessionEngine<'a> {
    db: &'a Database,
}

impl<'a> SessionEngine<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn start_hierarchical(&self, opts: StartSessionOptions) -> Result<Session> {
        let (depth, root_id) = match &opts.parent_id {
            Some(parent_id) => {
                let parent = self
                    .db
                    .get_session(parent_id)
                    .map_err(store_err)?
                    .ok_or_else(|| {
                        DomainError::new(
                            DomainErrorKind::InvalidParent,
                            format!("parent session '{parent_id}' does not exist"),
                        )
                    })?;
                (parent.depth + 1, parent.root_id)
            }
            None => (0, String::new()),
        };

        let id = opts.id.unwrap_or_else(|| new_id("sess"));
        let root_id = if opts.parent_id.is_none() { id.clone() } else { root_id };

        let session = Session {
            id: id.clone(),
            title: opts.title,
            session_type: opts.session_type.unwrap_or(SessionType::Worker),
            depth,
            parent_id: opts.parent_id,
            root_id,
            project_root: opts.project_root,
            linked_port_id: opts.linked_port_id,
            agent_id: opts.agent_id,
            token_budget: opts.token_budget,
            tokens_used: 0,
            cumulative_cost: 0.0,
            status: SessionStatus::Running,
            started_at: chrono::Utc::now(),
            ended_at: None,
        };

        self.db.insert_session(&session).map_err(store_err)?;
        self.db
            .log_session_event(&id, event_type::SESSION_START, &serde_json::json!({}))
            .map_err(store_err)?;

        Ok(session)
    }

    pub fn get(&self, id: &str) -> Result<Session> {
        self.db
            .get_session(id)
            .map_err(store_err)?
            .ok_or_else(|| DomainError::not_found(format!("session '{id}'")))
    }

    pub fn log_event(
        &self,
        session_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<i64> {
        self.get(session_id)?;
        self.db
            .log_session_event(session_id, event_type, payload)
            .map_err(store_err)
    }

    /// Newest-first event retrieval, optionally filtered to one event type.
    pub fn get_events(
        &self,
        session_id: &str,
        filter_type: Option<&str>,
        limit: usize,
    ) -> Result<Vec<core_types::SessionEvent>> {
        let mut events = self.db.session_events(session_id).map_err(store_err)?;
        events.reverse();
        if let Some(filter_type) = filter_type {
            events.retain(|e| e.event_type == filter_type);
        }
        events.truncate(limit);
        Ok(events)
    }

    pub fn end(&self, session_id: &str, terminal_status: SessionStatus, reason: &str) -> Result<()> {
        if !terminal_status.is_terminal() {
            return Err(DomainError::new(
                DomainErrorKind::InvalidState,
                format!("'{}' is not a terminal status", terminal_status.as_str()),
            ));
        }
        self.get(session_id)?;

        self.db
            .update_session_status(session_id, terminal_status, Some(chrono::Utc::now()))
            .map_err(store_err)?;
        self.db
            .log_session_event(
                session_id,
                event_type::SESSION_END,
                &serde_json::json!({ "reason": reason }),
            )
            .map_err(store_err)?;
        self.db.release_locks_for_session(session_id).map_err(store_err)?;
        Ok(())
    }

    /// Record a compaction: `after_tokens` is the caller-supplied post-compaction
    /// token count (the point of compacting is to shrink this below `before`,
    /// not to zero it out).
    pub fn compact(
        &self,
        session_id: &str,
        trigger: &str,
        preserved: &[String],
        after_tokens: i64,
    ) -> Result<()> {
        let session = self.get(session_id)?;
        let before = session.tokens_used;

        self.db
            .record_compact_event(session_id, trigger, before, after_tokens, preserved)
            .map_err(store_err)?;
        self.db
            .record_session_usage(session_id, after_tokens, session.cumulative_cost)
            .map_err(store_err)?;
        self.db
            .update_session_status(session_id, SessionStatus::Compacted, None)
            .map_err(store_err)?;
        self.db
            .log_session_event(
                session_id,
                event_type::COMPACT,
                &serde_json::json!({ "trigger": trigger, "before_tokens": before, "after_tokens": after_tokens }),
            )
            .map_err(store_err)?;
        Ok(())
    }

    pub fn tree(&self, root_session_id: &str) -> Result<Vec<Session>> {
        self.db.session_tree(root_session_id).map_err(store_err)
    }

    pub fn children(&self, session_id: &str) -> Result<Vec<Session>> {
        self.db.session_children(session_id).map_err(store_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(title: &str) -> StartSessionOptions {
        StartSessionOptions {
            id: None,
            title: title.to_string(),
            session_type: Some(SessionType::Build),
            parent_id: None,
            project_root: "/tmp/proj".to_string(),
            linked_port_id: None,
            agent_id: None,
            token_budget: 50_000,
        }
    }

    #[test]
    fn start_hierarchical_root_has_depth_zero_and_self_root() {
        let db = Database::open_in_memory().unwrap();
        let engine = SessionEngine::new(&db);
        let session = engine.start_hierarchical(opts("root build")).unwrap();
        assert_eq!(session.depth, 0);
        assert_eq!(session.root_id, session.id);
    }

    #[test]
    fn child_session_inherits_root_and_increments_depth() {
        let db = Database::open_in_memory().unwrap();
        let engine = SessionEngine::new(&db);
        let root = engine.start_hierarchical(opts("root build")).unwrap();

        let mut child_opts = opts("worker task");
        child_opts.session_type = Some(SessionType::Worker);
        child_opts.parent_id = Some(root.id.clone());
        let child = engine.start_hierarchical(child_opts).unwrap();

        assert_eq!(child.depth, 1);
        assert_eq!(child.root_id, root.id);
    }

    #[test]
    fn start_with_missing_parent_fails_invalid_parent() {
        let db = Database::open_in_memory().unwrap();
        let engine = SessionEngine::new(&db);
        let mut bad = opts("orphan");
        bad.parent_id = Some("does-not-exist".to_string());
        let err = engine.start_hierarchical(bad).unwrap_err();
        assert_eq!(err.kind, DomainErrorKind::InvalidParent);
    }

    #[test]
    fn end_releases_locks_and_sets_terminal_status() {
        let db = Database::open_in_memory().unwrap();
        let engine = SessionEngine::new(&db);
        let session = engine.start_hierarchical(opts("root build")).unwrap();
        db.acquire_lock("file:main.rs", &session.id).unwrap();

        engine
            .end(&session.id, SessionStatus::Complete, "done")
            .unwrap();

        let fetched = engine.get(&session.id).unwrap();
        assert_eq!(fetched.status, SessionStatus::Complete);
        assert!(fetched.ended_at.is_some());
        assert!(db.lock_holder("file:main.rs").unwrap().is_none());
    }

    #[test]
    fn compact_sets_post_compaction_tokens_and_marks_compacted() {
        let db = Database::open_in_memory().unwrap();
        let engine = SessionEngine::new(&db);
        let session = engine.start_hierarchical(opts("root build")).unwrap();
        db.record_session_usage(&session.id, 40_000, 1.2).unwrap();

        engine
            .compact(&session.id, "token limit reached", &["active-files".to_string()], 5_000)
            .unwrap();

        let fetched = engine.get(&session.id).unwrap();
        assert_eq!(fetched.status, SessionStatus::Compacted);
        assert_eq!(fetched.tokens_used, 5_000);
    }

    #[test]
    fn tree_orders_by_depth_then_start_time() {
        let db = Database::open_in_memory().unwrap();
        let engine = SessionEngine::new(&db);
        let root = engine.start_hierarchical(opts("root")).unwrap();
        let mut c1 = opts("c1");
        c1.parent_id = Some(root.id.clone());
        engine.start_hierarchical(c1).unwrap();

        let tree = engine.tree(&root.id).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].depth, 0);
    }
}
