use chrono::{DateTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Render a timestamp the way every TEXT timestamp column in this schema
/// stores it: RFC 3339 with millisecond precision, always UTC.
pub fn to_text(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_text() -> String {
    to_text(Utc::now())
}

pub fn from_text(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("invalid timestamp '{s}': {e}")))
}

pub fn from_text_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| from_text(&s)).transpose()
}
