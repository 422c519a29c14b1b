//! The per-call-chain stack of open scopes.

use txscope_core::{ScopeId, TransactionError, TransactionResult};

use crate::context::TransactionContext;

#[derive(Debug, Clone)]
struct Frame<H, S> {
    context: TransactionContext<H, S>,
    /// Set while a REQUIRES_NEW or NOT_SUPPORTED scope above this one is open.
    suspended: bool,
}

/// Ordered open scopes of one call chain; the top is the innermost scope.
///
/// A stack belongs to exactly one call chain and is never shared. Suspension
/// is explicit: a suspended frame stays on the stack, tagged, until the scope
/// that suspended it exits.
#[derive(Debug, Clone)]
pub struct ContextStack<H, S> {
    frames: Vec<Frame<H, S>>,
}

impl<H, S> Default for ContextStack<H, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H, S> ContextStack<H, S> {
    /// Create an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Number of open scopes, suspended ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no scope is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The innermost open scope.
    #[must_use]
    pub fn top(&self) -> Option<&TransactionContext<H, S>> {
        self.frames.last().map(|frame| &frame.context)
    }

    /// The innermost scope if it runs inside a transaction.
    ///
    /// A non-transactional scope on top hides everything beneath it, which is
    /// how NOT_SUPPORTED and SUPPORTS-without-transaction shield inner scopes.
    #[must_use]
    pub fn current_transaction(&self) -> Option<&TransactionContext<H, S>> {
        self.top().filter(|context| context.has_transaction())
    }

    /// Look up an open scope by id.
    #[must_use]
    pub fn get(&self, scope: ScopeId) -> Option<&TransactionContext<H, S>> {
        self.frames.iter().map(|frame| &frame.context).find(|context| context.scope() == scope)
    }

    pub(crate) fn get_mut(&mut self, scope: ScopeId) -> Option<&mut TransactionContext<H, S>> {
        self.frames
            .iter_mut()
            .map(|frame| &mut frame.context)
            .find(|context| context.scope() == scope)
    }

    /// Whether the given scope is currently suspended.
    #[must_use]
    pub fn is_suspended(&self, scope: ScopeId) -> bool {
        self.frames.iter().any(|frame| frame.suspended && frame.context.scope() == scope)
    }

    /// Number of suspended scopes.
    #[must_use]
    pub fn suspended_count(&self) -> usize {
        self.frames.iter().filter(|frame| frame.suspended).count()
    }

    /// Open scopes from innermost to outermost.
    pub fn iter(&self) -> impl Iterator<Item = &TransactionContext<H, S>> {
        self.frames.iter().rev().map(|frame| &frame.context)
    }

    pub(crate) fn push(&mut self, context: TransactionContext<H, S>) {
        self.frames.push(Frame { context, suspended: false });
    }

    /// Pop the innermost scope, which must be `expected`.
    ///
    /// On mismatch the stack is left untouched.
    pub(crate) fn pop(&mut self, expected: ScopeId) -> TransactionResult<TransactionContext<H, S>> {
        let top = self.top().ok_or(TransactionError::NoScope)?.scope();
        if top != expected {
            return Err(TransactionError::ScopeMismatch { expected: top, actual: expected });
        }
        self.frames.pop().map(|frame| frame.context).ok_or(TransactionError::NoScope)
    }

    /// Pop the innermost scope without checking its id.
    pub(crate) fn pop_any(&mut self) -> Option<TransactionContext<H, S>> {
        self.frames.pop().map(|frame| frame.context)
    }

    /// Tag the innermost scope as suspended and return its id.
    pub(crate) fn suspend_top(&mut self) -> Option<ScopeId> {
        let frame = self.frames.last_mut()?;
        frame.suspended = true;
        Some(frame.context.scope())
    }

    /// Clear the suspended tag of `scope`. Returns `false` if it was not suspended.
    pub(crate) fn resume(&mut self, scope: ScopeId) -> bool {
        match self.frames.iter_mut().find(|frame| frame.context.scope() == scope) {
            Some(frame) if frame.suspended => {
                frame.suspended = false;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use txscope_core::{TransactionDefinition, TransactionId};

    use super::*;
    use crate::context::ContextKind;

    type Stack = ContextStack<u64, u32>;

    fn physical(scope: u64) -> TransactionContext<u64, u32> {
        TransactionContext::new(
            ScopeId::new(scope),
            Some(TransactionId::new(scope)),
            None,
            TransactionDefinition::required(),
            ContextKind::NewPhysical { handle: scope },
        )
    }

    fn non_transactional(scope: u64) -> TransactionContext<u64, u32> {
        TransactionContext::new(
            ScopeId::new(scope),
            None,
            None,
            TransactionDefinition::default(),
            ContextKind::NonTransactional,
        )
    }

    #[test]
    fn pop_requires_innermost_scope() {
        let mut stack = Stack::new();
        stack.push(physical(1));
        stack.push(physical(2));

        assert_eq!(
            stack.pop(ScopeId::new(1)).map(|c| c.scope()),
            Err(TransactionError::ScopeMismatch {
                expected: ScopeId::new(2),
                actual: ScopeId::new(1)
            })
        );
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop(ScopeId::new(2)).map(|c| c.scope()), Ok(ScopeId::new(2)));
    }

    #[test]
    fn pop_on_empty_stack_reports_no_scope() {
        let mut stack = Stack::new();
        assert_eq!(stack.pop(ScopeId::new(1)).map(|c| c.scope()), Err(TransactionError::NoScope));
    }

    #[test]
    fn non_transactional_top_hides_transaction_below() {
        let mut stack = Stack::new();
        stack.push(physical(1));
        assert!(stack.current_transaction().is_some());

        stack.push(non_transactional(2));
        assert!(stack.current_transaction().is_none());
        assert_eq!(stack.top().map(TransactionContext::scope), Some(ScopeId::new(2)));
    }

    #[test]
    fn suspend_and_resume_round_trip() {
        let mut stack = Stack::new();
        stack.push(physical(1));
        assert_eq!(stack.suspend_top(), Some(ScopeId::new(1)));
        assert!(stack.is_suspended(ScopeId::new(1)));
        assert_eq!(stack.suspended_count(), 1);

        assert!(stack.resume(ScopeId::new(1)));
        assert!(!stack.resume(ScopeId::new(1)));
        assert_eq!(stack.suspended_count(), 0);
    }

    #[test]
    fn iter_runs_innermost_first() {
        let mut stack = Stack::new();
        stack.push(physical(1));
        stack.push(physical(2));
        let scopes: Vec<_> = stack.iter().map(TransactionContext::scope).collect();
        assert_eq!(scopes, vec![ScopeId::new(2), ScopeId::new(1)]);
    }
}
