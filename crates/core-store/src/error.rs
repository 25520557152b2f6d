use std::fmt;

/// Result type for core-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the store layer.
#[derive(Debug)]
pub enum Error {
    /// The underlying SQLite connection returned an error.
    Database(rusqlite::Error),
    /// IO operation failed (opening the database file, creating its parent
    /// directory, ...).
    Io(std::io::Error),
    /// A persisted column held a value this layer couldn't parse back into
    /// its domain type (a corrupt `status` string, a malformed JSON payload).
    Parse(String),
    /// Caller-input error not tied to a specific row (ambiguous prefix,
    /// malformed filter).
    Query(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Database(err) => write!(f, "database error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Parse(msg) => write!(f, "parse error: {}", msg),
            Error::Query(msg) => write!(f, "query error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Parse(_) | Error::Query(_) => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
