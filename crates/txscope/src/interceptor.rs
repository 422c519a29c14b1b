//! Explicit transaction interception.
//!
//! There is no implicit call interception here: a service operation runs inside
//! a transactional scope only when it is invoked through a
//! [`TransactionInterceptor`] (or a [`Transactional`] wrapper) that declares it
//! transactional. A body that calls another method of its own service directly
//! bypasses the interceptor, so that call gets no scope of its own.

use std::collections::HashMap;
use std::fmt;

use tracing::trace;
use txscope_core::TransactionDefinition;
use txscope_storage::ResourceManager;

use crate::coordinator::TransactionCoordinator;
use crate::error::Error;

/// Maps operation names to the definitions they run with.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use txscope::{TransactionCoordinator, TransactionInterceptor};
/// use txscope_core::TransactionDefinition;
/// use txscope_storage::backends::MemoryResourceManager;
///
/// let interceptor = TransactionInterceptor::new()
///     .with_operation("save", TransactionDefinition::required());
///
/// let mut coordinator = TransactionCoordinator::new(Arc::new(MemoryResourceManager::new()));
/// let active = interceptor
///     .invoke(&mut coordinator, "save", |c| Ok::<_, txscope::Error>(c.is_transaction_active()))
///     .unwrap();
/// assert!(active);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransactionInterceptor {
    attributes: HashMap<String, TransactionDefinition>,
}

impl TransactionInterceptor {
    /// Create an interceptor with no transactional operations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `operation` transactional with `definition`.
    #[must_use]
    pub fn with_operation(
        mut self,
        operation: impl Into<String>,
        definition: impl Into<TransactionDefinition>,
    ) -> Self {
        self.declare(operation, definition);
        self
    }

    /// Declare `operation` transactional with `definition`, replacing any
    /// earlier declaration.
    pub fn declare(
        &mut self,
        operation: impl Into<String>,
        definition: impl Into<TransactionDefinition>,
    ) {
        self.attributes.insert(operation.into(), definition.into());
    }

    /// The definition declared for `operation`, if any.
    #[must_use]
    pub fn definition(&self, operation: &str) -> Option<&TransactionDefinition> {
        self.attributes.get(operation)
    }

    /// Whether `operation` runs inside a scope.
    #[must_use]
    pub fn is_transactional(&self, operation: &str) -> bool {
        self.attributes.contains_key(operation)
    }

    /// Run `body` for `operation`, inside a scope if the operation is declared.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or a coordinator error converted into `E`.
    pub fn invoke<R, T, E, F>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        operation: &str,
        body: F,
    ) -> Result<T, E>
    where
        R: ResourceManager,
        F: FnOnce(&mut TransactionCoordinator<R>) -> Result<T, E>,
        E: From<Error> + fmt::Display,
    {
        match self.attributes.get(operation) {
            Some(definition) => {
                trace!(operation, propagation = %definition.propagation, "intercepted");
                coordinator.execute(definition, body)
            }
            None => body(coordinator),
        }
    }
}

/// A service wrapped with its transaction attributes.
///
/// Calls made through [`call`](Self::call) are intercepted. The body receives
/// the bare service, so anything it calls on that service directly is not.
#[derive(Debug, Clone)]
pub struct Transactional<S> {
    target: S,
    interceptor: TransactionInterceptor,
}

impl<S> Transactional<S> {
    /// Wrap `target` with the given attributes.
    pub const fn new(target: S, interceptor: TransactionInterceptor) -> Self {
        Self { target, interceptor }
    }

    /// The wrapped service.
    #[must_use]
    pub const fn target(&self) -> &S {
        &self.target
    }

    /// The attributes of the wrapped service.
    #[must_use]
    pub const fn interceptor(&self) -> &TransactionInterceptor {
        &self.interceptor
    }

    /// Invoke `operation` on the wrapped service through the interceptor.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or a coordinator error converted into `E`.
    pub fn call<R, T, E, F>(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        operation: &str,
        body: F,
    ) -> Result<T, E>
    where
        R: ResourceManager,
        F: FnOnce(&S, &mut TransactionCoordinator<R>) -> Result<T, E>,
        E: From<Error> + fmt::Display,
    {
        let target = &self.target;
        self.interceptor.invoke(coordinator, operation, |coordinator| body(target, coordinator))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use txscope_core::Propagation;
    use txscope_storage::backends::MemoryResourceManager;
    use txscope_storage::ResourceOp;

    use super::*;

    struct CallService;

    impl CallService {
        fn external(&self, coordinator: &mut TransactionCoordinator<MemoryResourceManager>) -> Vec<bool> {
            let mut seen = vec![coordinator.is_transaction_active()];
            seen.push(self.internal(coordinator));
            seen
        }

        fn internal(&self, coordinator: &mut TransactionCoordinator<MemoryResourceManager>) -> bool {
            coordinator.is_transaction_active()
        }
    }

    fn proxy() -> Transactional<CallService> {
        Transactional::new(
            CallService,
            TransactionInterceptor::new().with_operation("internal", Propagation::Required),
        )
    }

    #[test]
    fn declared_operation_runs_in_transaction() {
        let rm = Arc::new(MemoryResourceManager::new());
        let mut coordinator = TransactionCoordinator::new(Arc::clone(&rm));

        let active = proxy()
            .call(&mut coordinator, "internal", |svc, c| Ok::<_, Error>(svc.internal(c)))
            .expect("internal call");

        assert!(active);
        assert_eq!(
            rm.call_ops().expect("ops"),
            vec![ResourceOp::Begin, ResourceOp::Commit]
        );
    }

    #[test]
    fn self_invocation_bypasses_interception() {
        let rm = Arc::new(MemoryResourceManager::new());
        let mut coordinator = TransactionCoordinator::new(Arc::clone(&rm));

        let seen = proxy()
            .call(&mut coordinator, "external", |svc, c| Ok::<_, Error>(svc.external(c)))
            .expect("external call");

        assert_eq!(seen, vec![false, false]);
        assert!(rm.calls().expect("calls").is_empty());
    }

    #[test]
    fn redeclaring_replaces_definition() {
        let mut interceptor = TransactionInterceptor::new().with_operation("op", Propagation::Required);
        interceptor.declare("op", Propagation::Never);
        assert_eq!(
            interceptor.definition("op").map(|d| d.propagation),
            Some(Propagation::Never)
        );
        assert!(!interceptor.is_transactional("other"));
    }
}
