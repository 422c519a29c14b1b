//! Transaction error types.

use thiserror::Error;

use crate::types::{Propagation, ScopeId, TransactionId};

/// Errors raised by the propagation coordinator itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// A mode that requires an existing transaction found none.
    #[error("no existing transaction found for propagation {propagation}")]
    NoTransaction {
        /// The mode that was requested.
        propagation: Propagation,
    },

    /// A mode that forbids an existing transaction found one.
    #[error("existing transaction found for propagation {propagation}")]
    ExistingTransaction {
        /// The mode that was requested.
        propagation: Propagation,
    },

    /// The physical transaction was rolled back instead of committed because an
    /// inner scope marked it rollback-only without failing the outer scope.
    #[error("transaction {transaction} silently rolled back because it has been marked as rollback-only")]
    SilentRollback {
        /// The physical transaction that was rolled back.
        transaction: TransactionId,
    },

    /// NESTED was requested inside a transaction but savepoints are unavailable.
    #[error("nested transactions are not supported by the current configuration or resource manager")]
    NestedNotSupported,

    /// A scope was exited while it was not the innermost open scope.
    #[error("scope {actual} exited while {expected} is the innermost open scope")]
    ScopeMismatch {
        /// The scope currently at the top of the stack, if any.
        expected: ScopeId,
        /// The scope the caller tried to exit.
        actual: ScopeId,
    },

    /// A scope handle issued by a different coordinator was passed to exit.
    #[error("scope {scope} belongs to another coordinator")]
    ForeignScope {
        /// The scope named by the handle.
        scope: ScopeId,
    },

    /// An operation needed an open scope but the stack is empty.
    #[error("no transactional scope in progress")]
    NoScope,
}

impl TransactionError {
    /// Returns `true` if this error was raised while entering a scope.
    #[must_use]
    pub const fn is_rejected_entry(&self) -> bool {
        matches!(
            self,
            Self::NoTransaction { .. } | Self::ExistingTransaction { .. } | Self::NestedNotSupported
        )
    }

    /// Returns `true` for the silent rollback outcome.
    #[must_use]
    pub const fn is_silent_rollback(&self) -> bool {
        matches!(self, Self::SilentRollback { .. })
    }

    /// Returns `true` for errors caused by misusing the enter/exit protocol.
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(self, Self::ScopeMismatch { .. } | Self::ForeignScope { .. } | Self::NoScope)
    }
}

/// Result type alias for coordinator operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_disjoint() {
        let errors = [
            TransactionError::NoTransaction { propagation: Propagation::Mandatory },
            TransactionError::ExistingTransaction { propagation: Propagation::Never },
            TransactionError::SilentRollback { transaction: TransactionId::new(1) },
            TransactionError::NestedNotSupported,
            TransactionError::ScopeMismatch { expected: ScopeId::new(2), actual: ScopeId::new(1) },
            TransactionError::ForeignScope { scope: ScopeId::new(1) },
            TransactionError::NoScope,
        ];

        for err in &errors {
            let hits = [err.is_rejected_entry(), err.is_silent_rollback(), err.is_usage_error()]
                .into_iter()
                .filter(|hit| *hit)
                .count();
            assert_eq!(hits, 1, "{err} should fall in exactly one class");
        }
    }

    #[test]
    fn messages_name_the_mode() {
        let err = TransactionError::NoTransaction { propagation: Propagation::Mandatory };
        assert_eq!(err.to_string(), "no existing transaction found for propagation MANDATORY");
    }
}
