use core_types::{DomainError, DomainErrorKind};

pub type Error = DomainError;
pub type Result<T> = core_types::DomainResult<T>;

pub fn store_err(err: core_store::Error) -> DomainError {
    match err {
        core_store::Error::Parse(msg) => DomainError::new(DomainErrorKind::ParseError, msg),
        core_store::Error::Query(msg) => DomainError::new(DomainErrorKind::InvalidState, msg),
        other => DomainError::with_source(DomainErrorKind::IoError, "store operation failed", other),
    }
}
