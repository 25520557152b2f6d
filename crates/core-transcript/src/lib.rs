//! Parses append-only agent transcript files into token usage and
//! first/user-message records.
//!
//! The wire shape is fixed: newline-delimited JSON objects with a `type`
//! discriminant. `assistant` lines carry a `message.usage` block priced
//! against the table in `core_types::usage`; `human` lines carry a
//! `message.content` string or content-block array.

mod error;
mod schema;

pub mod scan;

pub use error::{Error, Result};
pub use scan::{first_user_message, scan_usage, user_messages, UsageReport};
