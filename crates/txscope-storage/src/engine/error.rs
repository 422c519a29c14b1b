//! Resource error types.

use std::fmt;

use thiserror::Error;

/// The operations of the resource manager contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceOp {
    /// Begin a physical transaction.
    Begin,
    /// Commit a physical transaction.
    Commit,
    /// Roll back a physical transaction.
    Rollback,
    /// Create a savepoint.
    CreateSavepoint,
    /// Roll back to a savepoint.
    RollbackToSavepoint,
    /// Release a savepoint.
    ReleaseSavepoint,
}

impl fmt::Display for ResourceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Begin => "begin",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::CreateSavepoint => "create savepoint",
            Self::RollbackToSavepoint => "rollback to savepoint",
            Self::ReleaseSavepoint => "release savepoint",
        };
        f.write_str(name)
    }
}

/// Errors raised by a resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The handle does not name an active physical transaction.
    #[error("unknown or completed transaction: {0}")]
    UnknownTransaction(String),

    /// The savepoint does not exist in the given transaction.
    #[error("unknown savepoint: {0}")]
    UnknownSavepoint(String),

    /// A write was attempted in a read-only transaction.
    #[error("cannot write in read-only transaction")]
    ReadOnly,

    /// The backend cannot create savepoints.
    #[error("savepoints are not supported by this resource manager")]
    SavepointsUnsupported,

    /// An internal lock was poisoned (a thread panicked while holding it).
    #[error("internal lock poisoned: {0}")]
    LockPoisoned(String),

    /// A failure injected for testing.
    #[error("injected failure during {operation}")]
    Injected {
        /// The operation that was made to fail.
        operation: ResourceOp,
    },

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type alias for resource manager operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
