//! Per-scope transaction state.

use txscope_core::{Propagation, ScopeId, TransactionDefinition, TransactionId};

/// How a scope relates to the physical resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextKind<H, S> {
    /// The scope began the physical transaction and will commit or roll it back.
    NewPhysical {
        /// The physical transaction handle.
        handle: H,
    },

    /// The scope participates in a transaction owned by another scope.
    Joined {
        /// The scope whose rollback-only flag this scope writes to.
        owner: ScopeId,
        /// The physical transaction handle, shared with the owner.
        handle: H,
    },

    /// The scope opened a savepoint inside an existing physical transaction.
    Nested {
        /// The scope that decides the fate of the enclosing transaction; it is
        /// marked rollback-only if the savepoint cannot be rolled back.
        enclosing: ScopeId,
        /// The physical transaction handle.
        handle: H,
        /// The savepoint this scope rolls back to or releases.
        savepoint: S,
    },

    /// The scope runs without a transaction and holds no resource state.
    NonTransactional,
}

/// The shared parts of an existing transaction a new scope can participate in.
#[derive(Debug, Clone)]
pub(crate) struct Participation<H> {
    pub(crate) owner: ScopeId,
    pub(crate) transaction: TransactionId,
    pub(crate) handle: H,
}

/// One logical transaction boundary.
///
/// Created by [`TransactionCoordinator::enter`](crate::TransactionCoordinator::enter)
/// and discarded by the matching exit. Everything except the rollback flags is
/// fixed at creation; the flags only ever go from `false` to `true`.
#[derive(Debug, Clone)]
pub struct TransactionContext<H, S> {
    scope: ScopeId,
    transaction: Option<TransactionId>,
    parent: Option<ScopeId>,
    definition: TransactionDefinition,
    kind: ContextKind<H, S>,
    suspended: Option<ScopeId>,
    rollback_only: bool,
    local_rollback: bool,
}

impl<H, S> TransactionContext<H, S> {
    pub(crate) fn new(
        scope: ScopeId,
        transaction: Option<TransactionId>,
        parent: Option<ScopeId>,
        definition: TransactionDefinition,
        kind: ContextKind<H, S>,
    ) -> Self {
        Self {
            scope,
            transaction,
            parent,
            definition,
            kind,
            suspended: None,
            rollback_only: false,
            local_rollback: false,
        }
    }

    pub(crate) fn with_suspended(mut self, suspended: Option<ScopeId>) -> Self {
        self.suspended = suspended;
        self
    }

    /// The unique id of this scope.
    #[must_use]
    pub const fn scope(&self) -> ScopeId {
        self.scope
    }

    /// The logical transaction this scope runs in, if any.
    ///
    /// Joined scopes report the id of the transaction they joined.
    #[must_use]
    pub const fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction
    }

    /// The scope that was innermost when this one was entered.
    ///
    /// This is a lookup link only; the stack owns every context.
    #[must_use]
    pub const fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// The definition this scope was entered with.
    #[must_use]
    pub const fn definition(&self) -> &TransactionDefinition {
        &self.definition
    }

    /// The requested propagation mode.
    #[must_use]
    pub const fn propagation(&self) -> Propagation {
        self.definition.propagation
    }

    /// How this scope relates to the physical resource.
    #[must_use]
    pub const fn kind(&self) -> &ContextKind<H, S> {
        &self.kind
    }

    /// The physical transaction handle, unless the scope is non-transactional.
    #[must_use]
    pub const fn handle(&self) -> Option<&H> {
        match &self.kind {
            ContextKind::NewPhysical { handle }
            | ContextKind::Joined { handle, .. }
            | ContextKind::Nested { handle, .. } => Some(handle),
            ContextKind::NonTransactional => None,
        }
    }

    /// The savepoint, present only for NESTED scopes inside a transaction.
    #[must_use]
    pub const fn savepoint(&self) -> Option<&S> {
        match &self.kind {
            ContextKind::Nested { savepoint, .. } => Some(savepoint),
            _ => None,
        }
    }

    /// Whether this scope began a physical transaction.
    #[must_use]
    pub const fn is_new_physical(&self) -> bool {
        matches!(self.kind, ContextKind::NewPhysical { .. })
    }

    /// Whether this scope opened a savepoint.
    #[must_use]
    pub const fn is_nested(&self) -> bool {
        matches!(self.kind, ContextKind::Nested { .. })
    }

    /// Whether this scope runs inside a transaction at all.
    #[must_use]
    pub const fn has_transaction(&self) -> bool {
        !matches!(self.kind, ContextKind::NonTransactional)
    }

    /// The scope that decides the fate of this scope's work.
    ///
    /// New-physical and nested scopes own themselves; joined scopes point at
    /// the scope they joined. Non-transactional scopes have no owner.
    #[must_use]
    pub const fn owner(&self) -> Option<ScopeId> {
        match &self.kind {
            ContextKind::NewPhysical { .. } | ContextKind::Nested { .. } => Some(self.scope),
            ContextKind::Joined { owner, .. } => Some(*owner),
            ContextKind::NonTransactional => None,
        }
    }

    /// The scope this one suspended on entry, resumed on exit.
    #[must_use]
    pub const fn suspended(&self) -> Option<ScopeId> {
        self.suspended
    }

    /// Whether this scope has been marked rollback-only.
    #[must_use]
    pub const fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Whether this scope itself asked for a rollback (as opposed to being
    /// marked by a participating scope).
    #[must_use]
    pub const fn is_local_rollback(&self) -> bool {
        self.local_rollback
    }

    pub(crate) fn mark_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    pub(crate) fn mark_local_rollback(&mut self) {
        self.local_rollback = true;
        self.rollback_only = true;
    }
}

impl<H: Clone, S> TransactionContext<H, S> {
    /// What a joining or nesting scope needs from this one.
    pub(crate) fn participation(&self) -> Option<Participation<H>> {
        let owner = self.owner()?;
        let transaction = self.transaction?;
        let handle = self.handle()?.clone();
        Some(Participation { owner, transaction, handle })
    }
}
