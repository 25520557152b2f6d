use core_store::Database;
use core_types::{BudgetStatus, DomainError, NewCheckpoint};
use core_engine::CheckpointService;

use crate::error::{store_err, Result};

/// Default events-since-last-checkpoint horizon, used when the caller
/// doesn't source one from configuration.
pub const DEFAULT_CHECKPOINT_EVENT_HORIZON: usize = 10;
const WARNING_THRESHOLD: f64 = 0.80;

const COMPACTION_VOCABULARY: &[&str] =
    &["compact", "context window", "token limit", "truncat", "summariz"];

/// Token accounting, checkpoint policy, and compaction detection.
pub struct AttentionMonitor<'a> {
    db: &'a Database,
    checkpoint_event_horizon: usize,
}

impl<'a> AttentionMonitor<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self::with_event_horizon(db, DEFAULT_CHECKPOINT_EVENT_HORIZON)
    }

    /// Same as `new`, but with the events-since-last-checkpoint horizon
    /// sourced from configuration instead of the built-in default.
    pub fn with_event_horizon(db: &'a Database, checkpoint_event_horizon: usize) -> Self {
        Self { db, checkpoint_event_horizon }
    }

    /// Update a session's running token/cost counters inside one transaction
    /// and report the resulting budget status.
    pub fn record_usage(&self, session_id: &str, tokens_used: i64, cost_delta: f64) -> Result<BudgetStatus> {
        let session = self
            .db
            .get_session(session_id)
            .map_err(store_err)?
            .ok_or_else(|| DomainError::not_found(format!("session '{session_id}'")))?;

        let new_tokens = session.tokens_used + tokens_used;
        let new_cost = session.cumulative_cost + cost_delta;
        self.db
            .record_session_usage(session_id, new_tokens, new_cost)
            .map_err(store_err)?;

        Ok(budget_status(new_tokens, session.token_budget))
    }

    /// True when a checkpoint is due: the 80% budget threshold is crossed
    /// and no checkpoint has been taken within the last
    /// `checkpoint_event_horizon` session events.
    pub fn checkpoint_due(&self, session_id: &str) -> Result<bool> {
        let session = self
            .db
            .get_session(session_id)
            .map_err(store_err)?
            .ok_or_else(|| DomainError::not_found(format!("session '{session_id}'")))?;

        if session.budget_fraction() < WARNING_THRESHOLD {
            return Ok(false);
        }

        let latest = self.db.latest_checkpoint(session_id).map_err(store_err)?;
        let Some(latest) = latest else {
            return Ok(true);
        };

        let events = self.db.session_events(session_id).map_err(store_err)?;
        let events_since = events.iter().filter(|e| e.created_at > latest.created_at).count();
        Ok(events_since >= self.checkpoint_event_horizon)
    }

    /// Take a checkpoint unconditionally — used for explicit requests and
    /// for the mandatory checkpoint at every `port-end`.
    pub fn checkpoint_now(&self, new: &NewCheckpoint) -> Result<core_types::Checkpoint> {
        CheckpointService::new(self.db).create(new)
    }

    /// Take a checkpoint only if the policy says one is due.
    pub fn checkpoint_if_due(&self, new: &NewCheckpoint) -> Result<Option<core_types::Checkpoint>> {
        if self.checkpoint_due(&new.session_id)? {
            Ok(Some(self.checkpoint_now(new)?))
        } else {
            Ok(None)
        }
    }

    /// True when `text` contains any term from the fixed compaction
    /// vocabulary (case-insensitive substring match).
    pub fn detect_compact(&self, text: &str) -> bool {
        let lower = text.to_ascii_lowercase();
        COMPACTION_VOCABULARY.iter().any(|term| lower.contains(term))
    }
}

fn budget_status(tokens_used: i64, token_budget: i64) -> BudgetStatus {
    if token_budget <= 0 {
        return BudgetStatus::Nominal;
    }
    let fraction = tokens_used as f64 / token_budget as f64;
    if fraction >= 1.0 {
        BudgetStatus::Exhausted
    } else if fraction >= WARNING_THRESHOLD {
        BudgetStatus::Warning
    } else {
        BudgetStatus::Nominal
    }
}
