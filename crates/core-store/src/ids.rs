/// Use a caller-supplied id verbatim, or mint a fresh one with `prefix`.
pub fn ensure_id(id: Option<String>, prefix: &str) -> String {
    id.unwrap_or_else(|| core_types::new_id(prefix))
}
