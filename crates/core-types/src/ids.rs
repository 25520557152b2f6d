use uuid::Uuid;

/// Generate a fresh opaque identifier suitable for a Session, Port, Message,
/// Checkpoint, or Escalation primary key.
///
/// Entities that accept a caller-supplied id (Session, Port) still call this
/// when the caller leaves the id empty.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}
