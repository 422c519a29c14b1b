//! Propagation decisions.
//!
//! [`resolve`] maps a requested [`Propagation`] and the current transaction (if
//! any) to the [`Action`] the coordinator must take. It is pure and total: every
//! mode has a defined action both with and without a current transaction.
//!
//! | mode            | no current transaction   | current transaction exists       |
//! |-----------------|--------------------------|----------------------------------|
//! | `Required`      | begin physical           | join                             |
//! | `RequiresNew`   | begin physical           | suspend, begin physical          |
//! | `Nested`        | begin physical           | savepoint                        |
//! | `Supports`      | run without transaction  | join                             |
//! | `NotSupported`  | run without transaction  | suspend, run without transaction |
//! | `Mandatory`     | fail: no transaction     | join                             |
//! | `Never`         | run without transaction  | fail: existing transaction       |

use txscope_core::{Propagation, TransactionError};

use crate::context::TransactionContext;

/// What the coordinator does when a scope is entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Participate in the current transaction; no resource call.
    Join,

    /// Begin a new physical transaction.
    BeginPhysical {
        /// Suspend the current transaction first.
        suspend_current: bool,
    },

    /// Create a savepoint inside the current physical transaction.
    BeginNested,

    /// Run without a transaction; no resource call.
    NonTransactional {
        /// Suspend the current transaction first.
        suspend_current: bool,
    },

    /// Refuse to enter the scope.
    Reject(TransactionError),
}

impl Action {
    /// Whether this action issues a resource manager call on entry.
    #[must_use]
    pub const fn touches_resource(&self) -> bool {
        matches!(self, Self::BeginPhysical { .. } | Self::BeginNested)
    }

    /// Whether this action suspends the current transaction.
    #[must_use]
    pub const fn suspends_current(&self) -> bool {
        matches!(
            self,
            Self::BeginPhysical { suspend_current: true }
                | Self::NonTransactional { suspend_current: true }
        )
    }

    /// Short label for log output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::BeginPhysical { suspend_current: false } => "begin",
            Self::BeginPhysical { suspend_current: true } => "suspend and begin",
            Self::BeginNested => "savepoint",
            Self::NonTransactional { suspend_current: false } => "no transaction",
            Self::NonTransactional { suspend_current: true } => "suspend, no transaction",
            Self::Reject(_) => "reject",
        }
    }
}

/// Decide how a scope requesting `propagation` is entered.
///
/// `current` is the innermost open scope if it runs inside a transaction. A
/// non-transactional context passed here is treated as no transaction.
#[must_use]
pub fn resolve<H, S>(propagation: Propagation, current: Option<&TransactionContext<H, S>>) -> Action {
    let active = current.is_some_and(TransactionContext::has_transaction);

    match (propagation, active) {
        (Propagation::Required | Propagation::Nested | Propagation::RequiresNew, false) => {
            Action::BeginPhysical { suspend_current: false }
        }
        (Propagation::Required | Propagation::Supports | Propagation::Mandatory, true) => {
            Action::Join
        }
        (Propagation::RequiresNew, true) => Action::BeginPhysical { suspend_current: true },
        (Propagation::Nested, true) => Action::BeginNested,
        (Propagation::Supports | Propagation::NotSupported | Propagation::Never, false) => {
            Action::NonTransactional { suspend_current: false }
        }
        (Propagation::NotSupported, true) => Action::NonTransactional { suspend_current: true },
        (Propagation::Mandatory, false) => {
            Action::Reject(TransactionError::NoTransaction { propagation })
        }
        (Propagation::Never, true) => {
            Action::Reject(TransactionError::ExistingTransaction { propagation })
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use txscope_core::{ScopeId, TransactionDefinition, TransactionId};

    use super::*;
    use crate::context::ContextKind;

    type Context = TransactionContext<u64, u32>;

    fn active() -> Context {
        TransactionContext::new(
            ScopeId::new(1),
            Some(TransactionId::new(1)),
            None,
            TransactionDefinition::required(),
            ContextKind::NewPhysical { handle: 1 },
        )
    }

    fn idle() -> Context {
        TransactionContext::new(
            ScopeId::new(2),
            None,
            None,
            TransactionDefinition::new(Propagation::Supports),
            ContextKind::NonTransactional,
        )
    }

    fn arb_propagation() -> impl Strategy<Value = Propagation> {
        prop::sample::select(Propagation::ALL.to_vec())
    }

    #[test]
    fn decision_table_without_transaction() {
        let expected = [
            (Propagation::Required, Action::BeginPhysical { suspend_current: false }),
            (Propagation::RequiresNew, Action::BeginPhysical { suspend_current: false }),
            (Propagation::Nested, Action::BeginPhysical { suspend_current: false }),
            (Propagation::Supports, Action::NonTransactional { suspend_current: false }),
            (Propagation::NotSupported, Action::NonTransactional { suspend_current: false }),
            (
                Propagation::Mandatory,
                Action::Reject(TransactionError::NoTransaction {
                    propagation: Propagation::Mandatory,
                }),
            ),
            (Propagation::Never, Action::NonTransactional { suspend_current: false }),
        ];

        for (mode, action) in expected {
            assert_eq!(resolve::<u64, u32>(mode, None), action, "{mode} without transaction");
        }
    }

    #[test]
    fn decision_table_with_transaction() {
        let current = active();
        let expected = [
            (Propagation::Required, Action::Join),
            (Propagation::RequiresNew, Action::BeginPhysical { suspend_current: true }),
            (Propagation::Nested, Action::BeginNested),
            (Propagation::Supports, Action::Join),
            (Propagation::NotSupported, Action::NonTransactional { suspend_current: true }),
            (Propagation::Mandatory, Action::Join),
            (
                Propagation::Never,
                Action::Reject(TransactionError::ExistingTransaction {
                    propagation: Propagation::Never,
                }),
            ),
        ];

        for (mode, action) in expected {
            assert_eq!(resolve(mode, Some(&current)), action, "{mode} with transaction");
        }
    }

    #[test]
    fn non_transactional_current_counts_as_none() {
        let current = idle();
        for mode in Propagation::ALL {
            assert_eq!(resolve(mode, Some(&current)), resolve::<u64, u32>(mode, None));
        }
    }

    #[test]
    fn labels_follow_suspension() {
        let current = active();
        assert_eq!(resolve(Propagation::RequiresNew, Some(&current)).label(), "suspend and begin");
        assert_eq!(resolve::<u64, u32>(Propagation::RequiresNew, None).label(), "begin");
        assert_eq!(resolve(Propagation::Nested, Some(&current)).label(), "savepoint");
    }

    proptest! {
        #[test]
        fn resolve_is_deterministic(mode in arb_propagation(), with_tx in any::<bool>()) {
            let current = active();
            let current = with_tx.then_some(&current);
            prop_assert_eq!(resolve(mode, current), resolve(mode, current));
        }

        #[test]
        fn only_suspending_modes_suspend(mode in arb_propagation(), with_tx in any::<bool>()) {
            let current = active();
            let action = resolve(mode, with_tx.then_some(&current));
            prop_assert_eq!(action.suspends_current(), with_tx && mode.suspends_current());
        }

        #[test]
        fn rejections_never_touch_resources(mode in arb_propagation(), with_tx in any::<bool>()) {
            let current = active();
            let action = resolve(mode, with_tx.then_some(&current));
            if matches!(action, Action::Reject(_)) {
                prop_assert!(!action.touches_resource());
                prop_assert!(matches!(mode, Propagation::Mandatory | Propagation::Never));
            }
        }
    }
}
