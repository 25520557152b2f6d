use std::fmt;

use core_types::DomainErrorKind;
use serde_json::Value;

/// Wraps `core_runtime::Error` with the exit-code/message-prefix mapping
/// required by §6.3/§7: every kind maps to exit code 1, success is the only
/// path to 0.
#[derive(Debug)]
pub struct Error {
    inner: core_runtime::Error,
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match &self.inner {
            core_runtime::Error::Domain(err) => err.kind.exit_code(),
            _ => 1,
        }
    }

    pub fn as_json_fields(&self) -> Value {
        match &self.inner {
            core_runtime::Error::Domain(err) => serde_json::json!({
                "kind": err.kind.as_str(),
                "message": err.message,
            }),
            other => serde_json::json!({
                "kind": "io_error",
                "message": other.to_string(),
            }),
        }
    }

    pub fn kind(&self) -> Option<DomainErrorKind> {
        match &self.inner {
            core_runtime::Error::Domain(err) => Some(err.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

impl From<core_runtime::Error> for Error {
    fn from(inner: core_runtime::Error) -> Self {
        Self { inner }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self { inner: core_runtime::Error::Io(err) }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self {
            inner: core_runtime::Error::InvalidOperation(format!("invalid JSON payload: {err}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
