//! Transactional SQLite store for sessions, ports, locks, messages,
//! checkpoints and escalations.
//!
//! `Database` is the only public entry point; everything else lives in
//! `queries::*` and operates on a borrowed `rusqlite::Connection` so the
//! higher-level engine crates can compose several query calls inside one
//! `with_transaction` when an operation must be atomic (port status
//! transitions, lock acquisition).

mod db;
mod error;
mod ids;
mod rows;
mod schema;
mod time;

pub mod queries;

pub use db::Database;
pub use error::{Error, Result};
pub use schema::SCHEMA_VERSION;

use chrono::{DateTime, Utc};
use core_types::{
    Checkpoint, Escalation, EscalationStatus, EscalationSummary, Lock, Message, NewCheckpoint,
    NewMessage, Pipeline, PipelineProgress, PipelineStatus, Port, PortStatus, PortSummary,
    Session, SessionEvent, SessionStatus,
};

impl Database {
    // -- sessions ---------------------------------------------------------

    pub fn insert_session(&self, session: &Session) -> Result<()> {
        self.with_conn(|conn| queries::session::insert(conn, session))
    }

    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        self.with_conn(|conn| queries::session::get(conn, id))
    }

    pub fn session_children(&self, parent_id: &str) -> Result<Vec<Session>> {
        self.with_conn(|conn| queries::session::children(conn, parent_id))
    }

    pub fn session_tree(&self, root_id: &str) -> Result<Vec<Session>> {
        self.with_conn(|conn| queries::session::tree(conn, root_id))
    }

    pub fn list_sessions(
        &self,
        project_root: Option<&str>,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>> {
        self.with_conn(|conn| queries::session::list(conn, project_root, status))
    }

    pub fn update_session_status(
        &self,
        id: &str,
        status: SessionStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.with_conn(|conn| queries::session::update_status(conn, id, status, ended_at))
    }

    pub fn record_session_usage(&self, id: &str, tokens_used: i64, cumulative_cost: f64) -> Result<()> {
        self.with_conn(|conn| queries::session::record_usage(conn, id, tokens_used, cumulative_cost))
    }

    pub fn find_session_by_prefix(&self, prefix: &str) -> Result<Option<String>> {
        self.with_conn(|conn| queries::session::find_by_prefix(conn, prefix))
    }

    pub fn log_session_event(
        &self,
        session_id: &str,
        event_type: &str,
        event_data: &serde_json::Value,
    ) -> Result<i64> {
        self.with_conn(|conn| queries::session::insert_event(conn, session_id, event_type, event_data))
    }

    pub fn session_events(&self, session_id: &str) -> Result<Vec<SessionEvent>> {
        self.with_conn(|conn| queries::session::events(conn, session_id))
    }

    // -- ports --------------------------------------------------------------

    pub fn insert_port(&self, port: &Port, depends_on: &[String]) -> Result<()> {
        self.with_conn(|conn| queries::port::insert(conn, port, depends_on))
    }

    pub fn get_port(&self, id: &str) -> Result<Option<Port>> {
        self.with_conn(|conn| queries::port::get(conn, id))
    }

    pub fn port_dependencies(&self, port_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| queries::port::dependencies(conn, port_id))
    }

    pub fn port_dependencies_satisfied(&self, port_id: &str) -> Result<bool> {
        self.with_conn(|conn| queries::port::dependencies_satisfied(conn, port_id))
    }

    pub fn list_ports(
        &self,
        pipeline_id: Option<&str>,
        status: Option<PortStatus>,
    ) -> Result<Vec<Port>> {
        self.with_conn(|conn| queries::port::list(conn, pipeline_id, status))
    }

    pub fn update_port_status(
        &self,
        id: &str,
        status: PortStatus,
        linked_session_id: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| queries::port::update_status(conn, id, status, linked_session_id))
    }

    pub fn delete_port(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| queries::port::delete(conn, id))
    }

    pub fn port_summary(&self, pipeline_id: Option<&str>) -> Result<PortSummary> {
        self.with_conn(|conn| queries::port::summary(conn, pipeline_id))
    }

    // -- pipelines ------------------------------------------------------

    pub fn create_pipeline(&self, id: Option<String>, name: &str) -> Result<Pipeline> {
        self.with_conn(|conn| queries::pipeline::create(conn, id, name))
    }

    pub fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>> {
        self.with_conn(|conn| queries::pipeline::get(conn, id))
    }

    pub fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        self.with_conn(queries::pipeline::list)
    }

    pub fn update_pipeline_status(&self, id: &str, status: PipelineStatus) -> Result<()> {
        self.with_conn(|conn| queries::pipeline::update_status(conn, id, status))
    }

    pub fn pipeline_progress(&self, id: &str) -> Result<Option<PipelineProgress>> {
        self.with_conn(|conn| queries::pipeline::progress(conn, id))
    }

    // -- locks ------------------------------------------------------------

    pub fn acquire_lock(&self, resource: &str, session_id: &str) -> Result<()> {
        self.with_conn(|conn| queries::lock::acquire(conn, resource, session_id))
    }

    pub fn release_lock(&self, resource: &str, session_id: &str) -> Result<()> {
        self.with_conn(|conn| queries::lock::release(conn, resource, session_id))
    }

    pub fn release_locks_for_session(&self, session_id: &str) -> Result<u64> {
        self.with_conn(|conn| queries::lock::release_all_for_session(conn, session_id))
    }

    pub fn lock_holder(&self, resource: &str) -> Result<Option<String>> {
        self.with_conn(|conn| queries::lock::holder(conn, resource))
    }

    pub fn list_locks(&self) -> Result<Vec<Lock>> {
        self.with_conn(queries::lock::list)
    }

    // -- messages ---------------------------------------------------------

    pub fn send_message(&self, new: &NewMessage) -> Result<Message> {
        self.with_conn(|conn| queries::message::send(conn, new))
    }

    pub fn get_message(&self, id: &str) -> Result<Option<Message>> {
        self.with_conn(|conn| queries::message::get(conn, id))
    }

    pub fn receive_messages(&self, session_id: &str, limit: i64) -> Result<Vec<Message>> {
        self.with_conn(|conn| queries::message::receive(conn, session_id, limit))
    }

    pub fn mark_message_processed(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| queries::message::mark_processed(conn, id))
    }

    pub fn messages_by_conversation(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.with_conn(|conn| queries::message::by_conversation(conn, conversation_id))
    }

    pub fn conversation_tokens(&self, conversation_id: &str) -> Result<i64> {
        self.with_conn(|conn| queries::message::conversation_tokens(conn, conversation_id))
    }

    pub fn sweep_expired_messages(&self, older_than_secs: i64) -> Result<u64> {
        self.with_conn(|conn| queries::message::sweep_expired(conn, older_than_secs))
    }

    // -- checkpoints & compaction ------------------------------------------

    pub fn create_checkpoint(
        &self,
        new: &NewCheckpoint,
        tokens_used: i64,
        token_budget: i64,
    ) -> Result<Checkpoint> {
        self.with_conn(|conn| queries::checkpoint::create(conn, new, tokens_used, token_budget))
    }

    pub fn latest_checkpoint(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        self.with_conn(|conn| queries::checkpoint::latest_for_session(conn, session_id))
    }

    pub fn list_checkpoints(&self, session_id: &str) -> Result<Vec<Checkpoint>> {
        self.with_conn(|conn| queries::checkpoint::list_for_session(conn, session_id))
    }

    pub fn record_compact_event(
        &self,
        session_id: &str,
        trigger_reason: &str,
        before_tokens: i64,
        after_tokens: i64,
        preserved_context: &[String],
    ) -> Result<()> {
        self.with_conn(|conn| {
            queries::checkpoint::insert_compact_event(
                conn,
                session_id,
                trigger_reason,
                before_tokens,
                after_tokens,
                preserved_context,
            )
        })
    }

    // -- escalations --------------------------------------------------------

    pub fn open_escalation(&self, session_id: Option<&str>, issue: &str) -> Result<Escalation> {
        self.with_conn(|conn| queries::escalation::open(conn, session_id, issue))
    }

    pub fn resolve_escalation(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| queries::escalation::resolve(conn, id))
    }

    pub fn dismiss_escalation(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| queries::escalation::dismiss(conn, id))
    }

    pub fn list_escalations(&self, status: Option<EscalationStatus>) -> Result<Vec<Escalation>> {
        self.with_conn(|conn| queries::escalation::list(conn, status))
    }

    pub fn escalation_summary(&self) -> Result<EscalationSummary> {
        self.with_conn(queries::escalation::summary)
    }
}
