//! Error types for `txscope`.
//!
//! This module provides the [`enum@Error`] type returned by the coordinator. It
//! wraps the two error families the coordinator can produce: propagation
//! decisions and outcomes ([`TransactionError`]) and resource manager failures
//! ([`ResourceError`]), which pass through unchanged.

use thiserror::Error;
use txscope_core::TransactionError;
use txscope_storage::ResourceError;

/// Errors returned by the transaction coordinator.
///
/// Application errors never appear here. Application code defines its own
/// error type with a `#[from] txscope::Error` variant, and the coordinator
/// hands the application's own errors back untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A propagation decision or completion outcome.
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// The resource manager failed.
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),
}

impl Error {
    /// Returns the transaction error, if this is one.
    #[must_use]
    pub const fn as_transaction(&self) -> Option<&TransactionError> {
        match self {
            Self::Transaction(err) => Some(err),
            Self::Resource(_) => None,
        }
    }

    /// Returns the resource error, if this is one.
    #[must_use]
    pub const fn as_resource(&self) -> Option<&ResourceError> {
        match self {
            Self::Resource(err) => Some(err),
            Self::Transaction(_) => None,
        }
    }

    /// Returns `true` if a commit was replaced by a rollback that the caller
    /// did not ask for.
    #[must_use]
    pub const fn is_silent_rollback(&self) -> bool {
        matches!(self, Self::Transaction(err) if err.is_silent_rollback())
    }

    /// Returns `true` if MANDATORY found no transaction.
    #[must_use]
    pub const fn is_no_transaction(&self) -> bool {
        matches!(self, Self::Transaction(TransactionError::NoTransaction { .. }))
    }

    /// Returns `true` if NEVER found an existing transaction.
    #[must_use]
    pub const fn is_existing_transaction(&self) -> bool {
        matches!(self, Self::Transaction(TransactionError::ExistingTransaction { .. }))
    }
}

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, Error>;
