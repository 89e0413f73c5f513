// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error taxonomy for the library-management core
//!
//! Callers switch on [`ErrorKind`], never on the rendered message. Every
//! fallible operation in this crate returns [`LibraryError`] or a narrower
//! `thiserror` enum that converts into it at the component boundary.

use thiserror::Error;

/// Structured error kind, stable across releases.
///
/// This is what callers `match` on; the `LibraryError` variant carries the
/// human-readable detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    Conflict,
    ConcurrencyConflict,
    DuplicateEvent,
    StorageFailure,
    BusFailure,
    Unauthorized,
    Forbidden,
    Internal,
}

impl ErrorKind {
    /// Whether a command handler should transparently retry on this kind.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorKind::ConcurrencyConflict | ErrorKind::DuplicateEvent)
    }
}

/// The crate's public error type.
///
/// Carries `{kind, code, message}` as required by the error-handling design:
/// `kind()` returns the taxonomy member, `code()` a short machine-readable
/// slug for the specific cause, and `Display` the human message.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("concurrency conflict: expected version {expected}, found {actual}")]
    ConcurrencyConflict { expected: u64, actual: u64 },

    #[error("duplicate event at (aggregate_id={aggregate_id}, version={version})")]
    DuplicateEvent { aggregate_id: String, version: u64 },

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("bus failure: {0}")]
    BusFailure(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LibraryError {
    /// Stable taxonomy member for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LibraryError::ValidationError(_) => ErrorKind::ValidationError,
            LibraryError::NotFound(_) => ErrorKind::NotFound,
            LibraryError::Conflict(_) => ErrorKind::Conflict,
            LibraryError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            LibraryError::DuplicateEvent { .. } => ErrorKind::DuplicateEvent,
            LibraryError::StorageFailure(_) => ErrorKind::StorageFailure,
            LibraryError::BusFailure(_) => ErrorKind::BusFailure,
            LibraryError::Unauthorized(_) => ErrorKind::Unauthorized,
            LibraryError::Forbidden(_) => ErrorKind::Forbidden,
            LibraryError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Short machine-readable code for the specific cause, distinct from `kind`.
    pub fn code(&self) -> &'static str {
        match self {
            LibraryError::ValidationError(_) => "validation_error",
            LibraryError::NotFound(_) => "not_found",
            LibraryError::Conflict(_) => "conflict",
            LibraryError::ConcurrencyConflict { .. } => "concurrency_conflict",
            LibraryError::DuplicateEvent { .. } => "duplicate_event",
            LibraryError::StorageFailure(_) => "storage_failure",
            LibraryError::BusFailure(_) => "bus_failure",
            LibraryError::Unauthorized(_) => "unauthorized",
            LibraryError::Forbidden(_) => "forbidden",
            LibraryError::Internal(_) => "internal",
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }
}

pub type LibraryResult<T> = Result<T, LibraryError>;

impl From<async_nats::Error> for LibraryError {
    fn from(err: async_nats::Error) -> Self {
        LibraryError::BusFailure(err.to_string())
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(err: serde_json::Error) -> Self {
        LibraryError::Internal(format!("serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_and_duplicate_are_retriable() {
        assert!(ErrorKind::ConcurrencyConflict.is_retriable());
        assert!(ErrorKind::DuplicateEvent.is_retriable());
        assert!(!ErrorKind::NotFound.is_retriable());
        assert!(!ErrorKind::Internal.is_retriable());
    }

    #[test]
    fn kind_matches_variant() {
        let err = LibraryError::ConcurrencyConflict { expected: 2, actual: 3 };
        assert_eq!(err.kind(), ErrorKind::ConcurrencyConflict);
        assert_eq!(err.code(), "concurrency_conflict");
        assert!(err.is_retriable());
    }
}
