use core_store::Database;
use core_types::{
    event_type, new_id, DomainError, DomainErrorKind, Port, PortStatus, PortSummary,
};

use crate::error::{store_err, Result};
use crate::rules::RulesActivator;

/// Port lifecycle, status transitions, dependency and progress tracking.
pub struct PortEngine<'a> {
    db: &'a Database,
    rules: &'a RulesActivator,
}

impl<'a> PortEngine<'a> {
    pub fn new(db: &'a Database, rules: &'a RulesActivator) -> Self {
        Self { db, rules }
    }

    pub fn create(
        &self,
        id: Option<String>,
        title: &str,
        file: Option<String>,
        pipeline_id: Option<String>,
        depends_on: &[String],
    ) -> Result<Port> {
        let id = id.unwrap_or_else(|| new_id("port"));
        let now = chrono::Utc::now();
        let port = Port {
            id: id.clone(),
            title: title.to_string(),
            file,
            status: PortStatus::Pending,
            pipeline_id,
            linked_session_id: None,
            estimated_tokens: None,
            estimated_cost: None,
            estimated_duration_secs: None,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_port(&port, depends_on).map_err(store_err)?;
        Ok(port)
    }

    pub fn get(&self, id: &str) -> Result<Port> {
        self.db
            .get_port(id)
            .map_err(store_err)?
            .ok_or_else(|| DomainError::not_found(format!("port '{id}'")))
    }

    pub fn list(&self, pipeline_id: Option<&str>, status: Option<PortStatus>) -> Result<Vec<Port>> {
        self.db.list_ports(pipeline_id, status).map_err(store_err)
    }

    pub fn summary(&self, pipeline_id: Option<&str>) -> Result<PortSummary> {
        self.db.port_summary(pipeline_id).map_err(store_err)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.get(id)?;
        self.db.delete_port(id).map_err(store_err)
    }

    /// Atomic status transition. Entering `running` checks dependency
    /// satisfaction and lock contention, materializes rules artifacts and
    /// emits `port-start`; leaving `running` tears artifacts down and emits
    /// `port-end`. A second `blocked` transition is a no-op.
    pub fn update_status(
        &self,
        id: &str,
        next: PortStatus,
        session_id: Option<&str>,
    ) -> Result<Port> {
        let port = self.get(id)?;

        if port.status == PortStatus::Blocked && next == PortStatus::Blocked {
            return Ok(port);
        }

        if !port.status.can_transition_to(next) {
            return Err(DomainError::new(
                DomainErrorKind::InvalidTransition,
                format!(
                    "port '{id}' cannot move from '{}' to '{}'",
                    port.status.as_str(),
                    next.as_str()
                ),
            ));
        }

        if next == PortStatus::Running {
            if !self.db.port_dependencies_satisfied(id).map_err(store_err)? {
                return Err(DomainError::new(
                    DomainErrorKind::InvalidTransition,
                    format!("port '{id}' has unmet dependencies (DependencyNotSatisfied)"),
                ));
            }
            self.check_resource_contention(&port)?;
        }

        self.db
            .update_port_status(id, next, session_id)
            .map_err(store_err)?;
        tracing::debug!(port_id = %id, from = %port.status.as_str(), to = %next.as_str(), "port status changed");

        if next == PortStatus::Running {
            let mut activated = port.clone();
            activated.status = next;
            if let Some(session_id) = session_id {
                activated.linked_session_id = Some(session_id.to_string());
            }
            self.rules.activate(&activated).map_err(|_| {
                DomainError::new(
                    DomainErrorKind::IoError,
                    format!("failed to materialize rules artifact for port '{id}'"),
                )
            })?;
            if let Some(session_id) = session_id {
                self.db
                    .log_session_event(session_id, event_type::PORT_START, &serde_json::json!({ "port_id": id }))
                    .map_err(store_err)?;
            }
        } else if port.status == PortStatus::Running {
            if let Err(err) = self.rules.deactivate(id) {
                tracing::warn!(port_id = %id, error = %err, "failed to remove rules artifact");
            }
            if let Some(session_id) = port.linked_session_id.as_deref() {
                self.db
                    .log_session_event(session_id, event_type::PORT_END, &serde_json::json!({ "port_id": id }))
                    .map_err(store_err)?;
            }
        }

        self.get(id)
    }

    /// A running port contends for the shared resource named by its id.
    /// Real callers declare finer-grained resources (file paths); this lock
    /// name is the minimum the engine itself can guarantee uniqueness for.
    fn check_resource_contention(&self, port: &Port) -> Result<()> {
        let resource = format!("port:{}", port.id);
        if let Some(holder) = self.db.lock_holder(&resource).map_err(store_err)? {
            return Err(DomainError::new(
                DomainErrorKind::ResourceBusy,
                format!("resource '{resource}' is held by session '{holder}'"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, tempfile::TempDir) {
        let db = Database::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        (db, dir)
    }

    #[test]
    fn create_starts_pending() {
        let (db, dir) = setup();
        let rules = RulesActivator::new(dir.path());
        let engine = PortEngine::new(&db, &rules);
        let port = engine.create(None, "do a thing", None, None, &[]).unwrap();
        assert_eq!(port.status, PortStatus::Pending);
    }

    #[test]
    fn transition_to_running_activates_rules_and_emits_event() {
        let (db, dir) = setup();
        let rules = RulesActivator::new(dir.path());
        let engine = PortEngine::new(&db, &rules);
        let port = engine.create(None, "do a thing", None, None, &[]).unwrap();

        let updated = engine
            .update_status(&port.id, PortStatus::Running, Some("sess-1"))
            .unwrap();
        assert_eq!(updated.status, PortStatus::Running);
        assert!(dir.path().join(format!("{}.md", port.id)).exists());
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let (db, dir) = setup();
        let rules = RulesActivator::new(dir.path());
        let engine = PortEngine::new(&db, &rules);
        let port = engine.create(None, "do a thing", None, None, &[]).unwrap();

        let err = engine
            .update_status(&port.id, PortStatus::Complete, None)
            .unwrap_err();
        assert_eq!(err.kind, DomainErrorKind::InvalidTransition);
    }

    #[test]
    fn blocked_twice_is_idempotent() {
        let (db, dir) = setup();
        let rules = RulesActivator::new(dir.path());
        let engine = PortEngine::new(&db, &rules);
        let port = engine.create(None, "do a thing", None, None, &[]).unwrap();
        engine
            .update_status(&port.id, PortStatus::Running, Some("sess-1"))
            .unwrap();
        engine.update_status(&port.id, PortStatus::Blocked, None).unwrap();
        engine.update_status(&port.id, PortStatus::Blocked, None).unwrap();
    }

    #[test]
    fn running_fails_with_unmet_dependency() {
        let (db, dir) = setup();
        let rules = RulesActivator::new(dir.path());
        let engine = PortEngine::new(&db, &rules);
        let dep = engine.create(None, "dependency", None, None, &[]).unwrap();
        let port = engine
            .create(None, "dependent", None, None, &[dep.id.clone()])
            .unwrap();

        let err = engine
            .update_status(&port.id, PortStatus::Running, Some("sess-1"))
            .unwrap_err();
        assert_eq!(err.kind, DomainErrorKind::InvalidTransition);

        engine
            .update_status(&dep.id, PortStatus::Running, Some("sess-1"))
            .unwrap();
        engine
            .update_status(&dep.id, PortStatus::Complete, None)
            .unwrap();
        engine
            .update_status(&port.id, PortStatus::Running, Some("sess-2"))
            .unwrap();
    }

    #[test]
    fn resource_contention_blocks_second_runner() {
        let (db, dir) = setup();
        let rules = RulesActivator::new(dir.path());
        let engine = PortEngine::new(&db, &rules);
        let port = engine.create(None, "do a thing", None, None, &[]).unwrap();
        db.acquire_lock(&format!("port:{}", port.id), "sess-1").unwrap();

        let err = engine
            .update_status(&port.id, PortStatus::Running, Some("sess-2"))
            .unwrap_err();
        assert_eq!(err.kind, DomainErrorKind::ResourceBusy);
    }
}
