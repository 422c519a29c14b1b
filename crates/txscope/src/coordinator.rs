//! The transaction coordinator.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, trace, warn};
use txscope_core::{
    Propagation, ScopeId, TransactionDefinition, TransactionError, TransactionId,
};
use txscope_storage::ResourceManager;

use crate::config::CoordinatorConfig;
use crate::context::{ContextKind, TransactionContext};
use crate::error::{Error, Result};
use crate::resolver::{resolve, Action};
use crate::stack::ContextStack;

static NEXT_COORDINATOR: AtomicU64 = AtomicU64::new(1);

/// How the body of a scope finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The body returned normally.
    Completed,
    /// The body failed with an application error.
    Failed,
    /// The body asked for a rollback without failing.
    RollbackRequested,
}

impl Outcome {
    /// Whether this outcome marks the scope rollback-only.
    #[must_use]
    pub const fn is_rollback(self) -> bool {
        !matches!(self, Self::Completed)
    }
}

/// Proof of a successful [`TransactionCoordinator::enter`], consumed by the
/// matching [`TransactionCoordinator::exit`].
///
/// A handle is only valid for the coordinator that issued it.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "every entered scope must be exited"]
pub struct ScopeHandle {
    coordinator: u64,
    scope: ScopeId,
    transaction: Option<TransactionId>,
    new_physical: bool,
}

impl ScopeHandle {
    /// The scope this handle exits.
    #[must_use]
    pub const fn scope(&self) -> ScopeId {
        self.scope
    }

    /// The logical transaction the scope runs in, if any.
    #[must_use]
    pub const fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction
    }

    /// Whether the scope began a physical transaction.
    #[must_use]
    pub const fn is_new_physical(&self) -> bool {
        self.new_physical
    }
}

/// Coordinates nested transactional scopes of one call chain.
///
/// Each call chain (a thread, or a task) owns one coordinator. Every scope is
/// opened with [`enter`](Self::enter) and closed with [`exit`](Self::exit), in
/// strict nesting order; [`execute`](Self::execute) pairs them around a closure.
/// The coordinator decides per scope whether to join, begin, savepoint, or run
/// without a transaction, tracks rollback-only marks between scopes, and issues
/// the matching calls on the shared [`ResourceManager`].
///
/// # Thread Safety
///
/// A coordinator is driven through `&mut self` and must not be shared between
/// call chains. The resource manager behind it is shared through an `Arc`; give
/// each call chain its own coordinator over the same manager.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use txscope::{Outcome, TransactionCoordinator};
/// use txscope_core::{Propagation, TransactionDefinition};
/// use txscope_storage::backends::MemoryResourceManager;
///
/// let rm = Arc::new(MemoryResourceManager::new());
/// let mut coordinator = TransactionCoordinator::new(Arc::clone(&rm));
///
/// let outer = coordinator.enter(&TransactionDefinition::required()).unwrap();
/// let inner = coordinator.enter_with(Propagation::Required).unwrap();
/// assert!(!inner.is_new_physical());
///
/// coordinator.exit(inner, Outcome::Completed).unwrap();
/// coordinator.exit(outer, Outcome::Completed).unwrap();
/// assert!(!coordinator.is_transaction_active());
/// ```
pub struct TransactionCoordinator<R: ResourceManager> {
    id: u64,
    resources: Arc<R>,
    config: CoordinatorConfig,
    stack: ContextStack<R::Handle, R::Savepoint>,
    next_scope: u64,
    next_transaction: u64,
}

impl<R: ResourceManager> fmt::Debug for TransactionCoordinator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("config", &self.config)
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}

impl<R: ResourceManager> TransactionCoordinator<R> {
    /// Create a coordinator with the default configuration.
    pub fn new(resources: Arc<R>) -> Self {
        Self::with_config(resources, CoordinatorConfig::default())
    }

    /// Create a coordinator with a custom configuration.
    pub fn with_config(resources: Arc<R>, config: CoordinatorConfig) -> Self {
        Self {
            id: NEXT_COORDINATOR.fetch_add(1, Ordering::Relaxed),
            resources,
            config,
            stack: ContextStack::new(),
            next_scope: 1,
            next_transaction: 1,
        }
    }

    /// The resource manager this coordinator drives.
    #[must_use]
    pub fn resources(&self) -> &Arc<R> {
        &self.resources
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// The open scopes of this call chain.
    #[must_use]
    pub const fn stack(&self) -> &ContextStack<R::Handle, R::Savepoint> {
        &self.stack
    }

    /// Look up the context behind a handle while its scope is open.
    #[must_use]
    pub fn context(&self, handle: &ScopeHandle) -> Option<&TransactionContext<R::Handle, R::Savepoint>> {
        if handle.coordinator != self.id {
            return None;
        }
        self.stack.get(handle.scope)
    }

    // ========================================================================
    // Entry
    // ========================================================================

    /// Enter a scope with a default definition for `propagation`.
    ///
    /// # Errors
    ///
    /// See [`enter`](Self::enter).
    pub fn enter_with(&mut self, propagation: Propagation) -> Result<ScopeHandle> {
        self.enter(&TransactionDefinition::new(propagation))
    }

    /// Enter a scope.
    ///
    /// Resolves the action for the requested propagation against the current
    /// transaction, performs the resource call the action needs (begin or
    /// savepoint), suspends the current transaction if required, and pushes the
    /// new context.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::NoTransaction`] for MANDATORY without a transaction
    /// - [`TransactionError::ExistingTransaction`] for NEVER inside a transaction
    /// - [`TransactionError::NestedNotSupported`] for NESTED inside a transaction
    ///   when savepoints are disabled or unsupported
    /// - [`Error::Resource`] if the begin or savepoint call fails
    ///
    /// On any error the stack is left exactly as it was.
    pub fn enter(&mut self, definition: &TransactionDefinition) -> Result<ScopeHandle> {
        let propagation = definition.propagation;
        let current = self.stack.current_transaction();
        let action = resolve(propagation, current);
        let suspend = action.suspends_current();
        let decision = action.label();
        let existing = current.and_then(TransactionContext::participation);
        let parent = self.stack.top().map(TransactionContext::scope);

        let (kind, transaction) = match (action, existing) {
            (Action::Reject(err), _) => {
                debug!(%propagation, %err, "rejected scope entry");
                return Err(err.into());
            }
            (Action::Join, Some(existing)) => (
                ContextKind::Joined { owner: existing.owner, handle: existing.handle },
                Some(existing.transaction),
            ),
            (Action::BeginNested, Some(existing)) => {
                if !self.config.nested_transaction_allowed || !self.resources.supports_savepoints()
                {
                    debug!(%propagation, "nested scope refused");
                    return Err(TransactionError::NestedNotSupported.into());
                }
                let savepoint = self.resources.create_savepoint(&existing.handle)?;
                (
                    ContextKind::Nested { enclosing: existing.owner, handle: existing.handle, savepoint },
                    Some(self.allocate_transaction()),
                )
            }
            (Action::BeginPhysical { .. }, _) => {
                let handle = self.resources.begin(definition)?;
                (ContextKind::NewPhysical { handle }, Some(self.allocate_transaction()))
            }
            (Action::NonTransactional { .. }, _) => (ContextKind::NonTransactional, None),
            // The resolver only joins or nests when a transaction is current.
            (Action::Join | Action::BeginNested, None) => {
                return Err(TransactionError::NoTransaction { propagation }.into());
            }
        };

        let suspended = if suspend { self.stack.suspend_top() } else { None };
        let scope = self.allocate_scope();
        let context = TransactionContext::new(scope, transaction, parent, definition.clone(), kind)
            .with_suspended(suspended);

        debug!(
            %scope,
            transaction = ?transaction,
            %propagation,
            decision,
            name = definition.display_name(),
            new_physical = context.is_new_physical(),
            nested = context.is_nested(),
            suspended = ?suspended,
            "entered scope"
        );

        let handle = ScopeHandle {
            coordinator: self.id,
            scope,
            transaction,
            new_physical: context.is_new_physical(),
        };
        self.stack.push(context);
        Ok(handle)
    }

    // ========================================================================
    // Rollback marking
    // ========================================================================

    /// Ask for the innermost scope's work to be rolled back.
    ///
    /// The scope records the request as its own, and the owning transaction is
    /// marked rollback-only. Inside a non-transactional scope the request has no
    /// resource effect.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NoScope`] if no scope is open.
    pub fn mark_rollback_only(&mut self) -> Result<()> {
        let scope = self.stack.top().map(TransactionContext::scope).ok_or(TransactionError::NoScope)?;
        self.mark(scope, Outcome::RollbackRequested);
        Ok(())
    }

    /// Apply the rollback-only marks an outcome implies for `scope`.
    fn mark(&mut self, scope: ScopeId, outcome: Outcome) {
        let Some(context) = self.stack.get_mut(scope) else {
            return;
        };
        if outcome == Outcome::RollbackRequested {
            context.mark_local_rollback();
        } else {
            context.mark_rollback_only();
        }

        let ContextKind::Joined { owner, .. } = *context.kind() else {
            if !context.has_transaction() {
                trace!(%scope, "rollback request in non-transactional scope ignored");
            }
            return;
        };

        if outcome == Outcome::RollbackRequested
            || self.config.global_rollback_on_participation_failure
        {
            if let Some(owner_context) = self.stack.get_mut(owner) {
                debug!(%scope, %owner, "participating scope marked transaction rollback-only");
                owner_context.mark_rollback_only();
            }
        }
    }

    // ========================================================================
    // Exit
    // ========================================================================

    /// Exit the innermost scope.
    ///
    /// Marks the scope rollback-only for `Failed` and `RollbackRequested`, pops
    /// it, then performs its terminal action: nothing for joined and
    /// non-transactional scopes, rollback-to or release of the savepoint for
    /// nested scopes, rollback or commit for new physical transactions. A scope
    /// that suspended another resumes it afterwards, whatever the result.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::ForeignScope`] if `handle` was issued by another
    ///   coordinator
    /// - [`TransactionError::NoScope`] / [`TransactionError::ScopeMismatch`] if
    ///   `handle` is not the innermost scope
    /// - [`TransactionError::SilentRollback`] if a physical transaction had to
    ///   be rolled back although this scope completed normally and did not ask
    ///   for the rollback itself
    /// - [`Error::Resource`] if the terminal resource call fails
    ///
    /// A usage error leaves the stack untouched but consumes `handle`, so the
    /// scopes still open can only be exited with their own handles or rolled
    /// back when the coordinator is dropped.
    pub fn exit(&mut self, handle: ScopeHandle, outcome: Outcome) -> Result<()> {
        if handle.coordinator != self.id {
            return Err(TransactionError::ForeignScope { scope: handle.scope }.into());
        }
        match self.stack.top() {
            None => return Err(TransactionError::NoScope.into()),
            Some(top) if top.scope() != handle.scope => {
                return Err(TransactionError::ScopeMismatch {
                    expected: top.scope(),
                    actual: handle.scope,
                }
                .into());
            }
            Some(_) => {}
        }

        if outcome.is_rollback() {
            self.mark(handle.scope, outcome);
        }
        let context = self.stack.pop(handle.scope)?;
        let result = self.complete(&context, outcome);

        if let Some(suspended) = context.suspended() {
            if self.stack.resume(suspended) {
                debug!(scope = %context.scope(), %suspended, "resumed suspended transaction");
            }
        }
        result
    }

    fn complete(
        &mut self,
        context: &TransactionContext<R::Handle, R::Savepoint>,
        outcome: Outcome,
    ) -> Result<()> {
        let scope = context.scope();
        let propagation = context.propagation();
        match context.kind() {
            ContextKind::NonTransactional => {
                trace!(%scope, %propagation, ?outcome, "exited non-transactional scope");
                Ok(())
            }
            ContextKind::Joined { owner, .. } => {
                trace!(%scope, %propagation, %owner, ?outcome, "exited participating scope");
                Ok(())
            }
            ContextKind::Nested { enclosing, handle, savepoint } => {
                if !context.is_rollback_only() {
                    debug!(%scope, ?savepoint, "releasing savepoint");
                    self.resources.release_savepoint(handle, savepoint)?;
                    return Ok(());
                }

                debug!(%scope, ?savepoint, ?outcome, "rolling back to savepoint");
                if let Err(err) = self.resources.rollback_to_savepoint(handle, savepoint) {
                    warn!(%scope, %enclosing, %err, "savepoint rollback failed, marking enclosing transaction");
                    if let Some(owner) = self.stack.get_mut(*enclosing) {
                        owner.mark_rollback_only();
                    }
                    return Err(err.into());
                }
                if outcome == Outcome::Completed && !context.is_local_rollback() {
                    let transaction = context.transaction_id().unwrap_or(TransactionId::new(0));
                    warn!(
                        %scope,
                        %transaction,
                        "nested scope rolled back to its savepoint because it has been marked as rollback-only"
                    );
                    return Err(TransactionError::SilentRollback { transaction }.into());
                }
                Ok(())
            }
            ContextKind::NewPhysical { handle } => {
                let transaction = context.transaction_id().unwrap_or(TransactionId::new(0));
                if !context.is_rollback_only() {
                    debug!(%scope, %transaction, "committing");
                    return self.commit_physical(handle, transaction);
                }

                debug!(%scope, %transaction, ?outcome, "rolling back");
                self.resources.rollback(handle)?;
                if outcome == Outcome::Completed && !context.is_local_rollback() {
                    warn!(
                        %scope,
                        %transaction,
                        "transaction rolled back because it has been marked as rollback-only"
                    );
                    return Err(TransactionError::SilentRollback { transaction }.into());
                }
                Ok(())
            }
        }
    }

    /// Commit, rolling back if the commit fails so the handle is never leaked.
    fn commit_physical(&self, handle: &R::Handle, transaction: TransactionId) -> Result<()> {
        let Err(err) = self.resources.commit(handle) else {
            return Ok(());
        };
        debug!(%transaction, %err, "commit failed, rolling back");
        if let Err(rollback_err) = self.resources.rollback(handle) {
            error!(%transaction, %err, %rollback_err, "rollback after failed commit also failed");
        }
        Err(err.into())
    }

    // ========================================================================
    // Template
    // ========================================================================

    /// Run `body` inside a scope entered with `definition`.
    ///
    /// The scope exits with [`Outcome::Completed`] when the body returns `Ok`
    /// and [`Outcome::Failed`] when it returns `Err`. The body's own error is
    /// returned unchanged, unless exiting the scope fails as well; then the exit
    /// error is returned and the body's error is logged.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or any error from [`enter`](Self::enter) or
    /// [`exit`](Self::exit) converted into `E`.
    pub fn execute<T, E, F>(&mut self, definition: &TransactionDefinition, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Self) -> std::result::Result<T, E>,
        E: From<Error> + fmt::Display,
    {
        let scope = self.enter(definition)?;
        match body(self) {
            Ok(value) => {
                self.exit(scope, Outcome::Completed)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(exit_err) = self.exit(scope, Outcome::Failed) {
                    error!(application_error = %err, %exit_err, "application error overridden by exit failure");
                    return Err(exit_err.into());
                }
                Err(err)
            }
        }
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Whether the innermost scope runs inside a transaction.
    #[must_use]
    pub fn is_transaction_active(&self) -> bool {
        self.stack.current_transaction().is_some()
    }

    /// Whether the current transaction will be rolled back.
    ///
    /// Checks the innermost scope's own mark and that of the scope owning its
    /// transaction. Returns `false` when no transaction is active.
    #[must_use]
    pub fn is_rollback_only(&self) -> bool {
        let Some(current) = self.stack.current_transaction() else {
            return false;
        };
        current.is_rollback_only()
            || current
                .owner()
                .and_then(|owner| self.stack.get(owner))
                .is_some_and(TransactionContext::is_rollback_only)
    }

    /// The physical handle persistence code should use, if a transaction is active.
    #[must_use]
    pub fn current_handle(&self) -> Option<&R::Handle> {
        self.stack.current_transaction().and_then(TransactionContext::handle)
    }

    /// The logical transaction of the innermost scope, if any.
    #[must_use]
    pub fn current_transaction_id(&self) -> Option<TransactionId> {
        self.stack.current_transaction().and_then(TransactionContext::transaction_id)
    }

    /// The explicit name of the innermost scope, if it was given one.
    #[must_use]
    pub fn current_name(&self) -> Option<&str> {
        self.stack.top().and_then(|context| context.definition().name.as_deref())
    }

    /// Number of open scopes, suspended ones included.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of suspended scopes.
    #[must_use]
    pub fn suspended_count(&self) -> usize {
        self.stack.suspended_count()
    }

    fn allocate_scope(&mut self) -> ScopeId {
        let scope = ScopeId::new(self.next_scope);
        self.next_scope += 1;
        scope
    }

    fn allocate_transaction(&mut self) -> TransactionId {
        let transaction = TransactionId::new(self.next_transaction);
        self.next_transaction += 1;
        transaction
    }
}

impl<R: ResourceManager> Drop for TransactionCoordinator<R> {
    fn drop(&mut self) {
        while let Some(context) = self.stack.pop_any() {
            warn!(scope = %context.scope(), "coordinator dropped with open scope");
            if let ContextKind::NewPhysical { handle } = context.kind() {
                if let Err(err) = self.resources.rollback(handle) {
                    warn!(scope = %context.scope(), %err, "rollback of abandoned transaction failed");
                }
            }
        }
    }
}
