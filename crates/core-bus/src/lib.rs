//! Durable inter-session messaging: priority and conversation ordering,
//! broadcast semantics, canonical payload helpers, and an expiry sweep.

mod error;

pub use error::{store_err, Error, Result};

use core_store::Database;
use core_types::{payloads, subtype, DomainError, Message, MessageType, NewMessage};

/// The Message Bus. `send`/`receive` enforce the priority/created-at
/// ordering and `to_session = None` broadcast semantics of §4.5; everything
/// else is a thin pass-through to the store.
pub struct MessageBus<'a> {
    db: &'a Database,
}

impl<'a> MessageBus<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn send(&self, new: NewMessage) -> Result<Message> {
        let message = self.db.send_message(&new).map_err(store_err)?;
        tracing::debug!(
            message_id = %message.id,
            from = %message.from_session,
            to = ?message.to_session,
            subtype = %message.subtype,
            "message delivered"
        );
        Ok(message)
    }

    /// Pending messages for `session_id` (direct or broadcast), priority
    /// descending then arrival ascending, bound by `limit` (default 10).
    pub fn receive(&self, session_id: &str, limit: Option<i64>) -> Result<Vec<Message>> {
        self.db
            .receive_messages(session_id, limit.unwrap_or(10))
            .map_err(store_err)
    }

    pub fn mark_delivered(&self, _id: &str) -> Result<()> {
        // Delivery is an at-least-once observation by the caller; the store
        // only distinguishes pending/processed/expired (see §4.5). Tracked
        // here so callers have a single bus API regardless of how much of
        // the state machine the store enforces directly.
        Ok(())
    }

    pub fn mark_processed(&self, id: &str) -> Result<()> {
        self.db.mark_message_processed(id).map_err(store_err)
    }

    pub fn get_by_conversation(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.db
            .messages_by_conversation(conversation_id)
            .map_err(store_err)
    }

    pub fn get_conversation_tokens(&self, conversation_id: &str) -> Result<i64> {
        self.db.conversation_tokens(conversation_id).map_err(store_err)
    }

    /// Transition every `pending` message older than `older_than_secs` to
    /// `expired`. Meant to be invoked periodically by the runtime facade,
    /// not by producers or consumers.
    pub fn sweep_expired(&self, older_than_secs: i64) -> Result<u64> {
        self.db.sweep_expired_messages(older_than_secs).map_err(store_err)
    }

    pub fn send_task_assign(
        &self,
        conversation_id: &str,
        from_session: &str,
        to_session: Option<&str>,
        payload: payloads::TaskAssign,
    ) -> Result<Message> {
        self.send_typed(conversation_id, from_session, to_session, subtype::TASK_ASSIGN, payload)
    }

    pub fn send_task_report(
        &self,
        conversation_id: &str,
        from_session: &str,
        to_session: Option<&str>,
        report_subtype: &str,
        payload: payloads::TaskReport,
    ) -> Result<Message> {
        self.send_typed(conversation_id, from_session, to_session, report_subtype, payload)
    }

    pub fn send_impl_ready(
        &self,
        conversation_id: &str,
        from_session: &str,
        to_session: Option<&str>,
        payload: payloads::ImplReady,
    ) -> Result<Message> {
        self.send_typed(conversation_id, from_session, to_session, subtype::IMPL_READY, payload)
    }

    pub fn send_test_result(
        &self,
        conversation_id: &str,
        from_session: &str,
        to_session: Option<&str>,
        result_subtype: &str,
        payload: payloads::TestResult,
    ) -> Result<Message> {
        self.send_typed(conversation_id, from_session, to_session, result_subtype, payload)
    }

    pub fn send_fix_request(
        &self,
        conversation_id: &str,
        from_session: &str,
        to_session: Option<&str>,
        payload: payloads::FixRequest,
    ) -> Result<Message> {
        self.send_typed(conversation_id, from_session, to_session, subtype::FIX_REQUEST, payload)
    }

    fn send_typed(
        &self,
        conversation_id: &str,
        from_session: &str,
        to_session: Option<&str>,
        subtype: &str,
        payload: impl serde::Serialize,
    ) -> Result<Message> {
        let payload = serde_json::to_value(payload).map_err(|err| {
            DomainError::with_source(
                core_types::DomainErrorKind::InvalidPayload,
                "message payload could not be serialized",
                err,
            )
        })?;

        self.send(NewMessage {
            id: None,
            conversation_id: conversation_id.to_string(),
            from_session: from_session.to_string(),
            to_session: to_session.map(|s| s.to_string()),
            message_type: MessageType::Request,
            subtype: subtype.to_string(),
            payload,
            token_count: None,
            cumulative_tokens: None,
            port_id: Some(conversation_id.to_string()),
            priority: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::DEFAULT_PRIORITY;

    fn new_message(to: Option<&str>) -> NewMessage {
        NewMessage {
            id: None,
            conversation_id: "port-1".to_string(),
            from_session: "operator".to_string(),
            to_session: to.map(|s| s.to_string()),
            message_type: MessageType::Request,
            subtype: subtype::TASK_ASSIGN.to_string(),
            payload: serde_json::json!({}),
            token_count: Some(10),
            cumulative_tokens: Some(10),
            port_id: Some("port-1".to_string()),
            priority: None,
        }
    }

    #[test]
    fn send_defaults_priority_and_pending_status() {
        let db = Database::open_in_memory().unwrap();
        let bus = MessageBus::new(&db);
        let message = bus.send(new_message(Some("worker-1"))).unwrap();
        assert_eq!(message.priority, DEFAULT_PRIORITY);
        assert_eq!(message.status, core_types::MessageStatus::Pending);
    }

    #[test]
    fn broadcast_messages_reach_any_session() {
        let db = Database::open_in_memory().unwrap();
        let bus = MessageBus::new(&db);
        bus.send(new_message(None)).unwrap();

        assert_eq!(bus.receive("worker-1", None).unwrap().len(), 1);
        assert_eq!(bus.receive("worker-2", None).unwrap().len(), 1);
    }

    #[test]
    fn get_by_conversation_orders_by_creation() {
        let db = Database::open_in_memory().unwrap();
        let bus = MessageBus::new(&db);
        bus.send(new_message(Some("w1"))).unwrap();
        bus.send(new_message(Some("w2"))).unwrap();

        let all = bus.get_by_conversation("port-1").unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn sweep_expired_transitions_old_pending_messages() {
        let db = Database::open_in_memory().unwrap();
        let bus = MessageBus::new(&db);
        bus.send(new_message(Some("w1"))).unwrap();

        let changed = bus.sweep_expired(-1).unwrap();
        assert_eq!(changed, 1);
        assert!(bus.receive("w1", None).unwrap().is_empty());
    }

    #[test]
    fn typed_helper_stores_canonical_subtype() {
        let db = Database::open_in_memory().unwrap();
        let bus = MessageBus::new(&db);
        let message = bus
            .send_task_assign(
                "port-1",
                "operator",
                Some("worker-1"),
                payloads::TaskAssign {
                    port_id: "port-1".to_string(),
                    port_spec: "do the thing".to_string(),
                    conventions: vec![],
                    context: None,
                },
            )
            .unwrap();
        assert_eq!(message.subtype, subtype::TASK_ASSIGN);
    }
}
