use core_store::Database;
use core_types::{DomainError, Escalation, EscalationStatus, EscalationSummary};

use crate::error::{store_err, Result};

/// CRUD over escalations. Status is monotonic: open -> resolved or
/// dismissed. Opening an escalation never blocks any other subsystem.
pub struct EscalationService<'a> {
    db: &'a Database,
}

impl<'a> EscalationService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn open(&self, session_id: Option<&str>, issue: &str) -> Result<Escalation> {
        self.db.open_escalation(session_id, issue).map_err(store_err)
    }

    fn get(&self, id: i64) -> Result<Escalation> {
        self.list(None)?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| DomainError::not_found(format!("escalation '{id}'")))
    }

    pub fn resolve(&self, id: i64) -> Result<()> {
        self.get(id)?;
        self.db.resolve_escalation(id).map_err(store_err)
    }

    pub fn dismiss(&self, id: i64) -> Result<()> {
        self.get(id)?;
        self.db.dismiss_escalation(id).map_err(store_err)
    }

    pub fn list(&self, status: Option<EscalationStatus>) -> Result<Vec<Escalation>> {
        self.db.list_escalations(status).map_err(store_err)
    }

    pub fn summary(&self) -> Result<EscalationSummary> {
        self.db.escalation_summary().map_err(store_err)
    }
}
