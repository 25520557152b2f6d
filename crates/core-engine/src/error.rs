use core_types::{DomainError, DomainErrorKind};

pub type Error = DomainError;
pub type Result<T> = core_types::DomainResult<T>;

/// Wrap a store-layer failure that isn't itself meaningful to a caller
/// (a disk error, a connection error) as an `IoError`. Call sites that can
/// distinguish a more specific kind (`NotFound`, `Held`, ...) construct a
/// `DomainError` directly instead of going through this helper.
pub fn store_err(err: core_store::Error) -> DomainError {
    match err {
        core_store::Error::Parse(msg) => DomainError::new(DomainErrorKind::ParseError, msg),
        core_store::Error::Query(msg) => DomainError::new(DomainErrorKind::InvalidState, msg),
        other => DomainError::with_source(DomainErrorKind::IoError, "store operation failed", other),
    }
}
