//! The resource manager contract.

use std::fmt;
use std::sync::Arc;

use txscope_core::TransactionDefinition;

use super::ResourceResult;

/// A transactional resource the coordinator can drive.
///
/// Implementations own one kind of physical resource (a database connection
/// pool, an in-memory store) and hand out opaque handles for each physical
/// transaction. All methods are synchronous relative to the caller; failures
/// are returned, never swallowed.
///
/// Implementations must be thread-safe (`Send + Sync`): independent call chains
/// may drive the same manager concurrently, each with its own handles.
pub trait ResourceManager: Send + Sync {
    /// Identifies one physical transaction.
    type Handle: Clone + fmt::Debug + PartialEq + Send;

    /// Identifies one savepoint inside a physical transaction.
    type Savepoint: Clone + fmt::Debug + PartialEq + Send;

    /// Begin a new physical transaction.
    ///
    /// Only the isolation level and read-only flag of `definition` are relevant
    /// here; propagation has already been decided by the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    fn begin(&self, definition: &TransactionDefinition) -> ResourceResult<Self::Handle>;

    /// Commit the physical transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown or the commit fails. A failed
    /// commit leaves the transaction active so it can still be rolled back.
    fn commit(&self, handle: &Self::Handle) -> ResourceResult<()>;

    /// Roll back the physical transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown or the rollback fails.
    fn rollback(&self, handle: &Self::Handle) -> ResourceResult<()>;

    /// Create a savepoint at the current position of the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown or savepoints are unsupported.
    fn create_savepoint(&self, handle: &Self::Handle) -> ResourceResult<Self::Savepoint>;

    /// Discard all work done since `savepoint` was created.
    ///
    /// The savepoint and any savepoints created after it are released.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle or savepoint is unknown.
    fn rollback_to_savepoint(
        &self,
        handle: &Self::Handle,
        savepoint: &Self::Savepoint,
    ) -> ResourceResult<()>;

    /// Release `savepoint`, keeping the work done since it was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle or savepoint is unknown.
    fn release_savepoint(
        &self,
        handle: &Self::Handle,
        savepoint: &Self::Savepoint,
    ) -> ResourceResult<()>;

    /// Whether this manager can create savepoints at all.
    ///
    /// The default implementation returns `true`.
    fn supports_savepoints(&self) -> bool {
        true
    }
}

// ============================================================================
// Blanket Implementations
// ============================================================================

/// Implement `ResourceManager` for `Arc<R>` so one manager can back many
/// coordinators.
impl<R: ResourceManager + ?Sized> ResourceManager for Arc<R> {
    type Handle = R::Handle;
    type Savepoint = R::Savepoint;

    fn begin(&self, definition: &TransactionDefinition) -> ResourceResult<Self::Handle> {
        (**self).begin(definition)
    }

    fn commit(&self, handle: &Self::Handle) -> ResourceResult<()> {
        (**self).commit(handle)
    }

    fn rollback(&self, handle: &Self::Handle) -> ResourceResult<()> {
        (**self).rollback(handle)
    }

    fn create_savepoint(&self, handle: &Self::Handle) -> ResourceResult<Self::Savepoint> {
        (**self).create_savepoint(handle)
    }

    fn rollback_to_savepoint(
        &self,
        handle: &Self::Handle,
        savepoint: &Self::Savepoint,
    ) -> ResourceResult<()> {
        (**self).rollback_to_savepoint(handle, savepoint)
    }

    fn release_savepoint(
        &self,
        handle: &Self::Handle,
        savepoint: &Self::Savepoint,
    ) -> ResourceResult<()> {
        (**self).release_savepoint(handle, savepoint)
    }

    fn supports_savepoints(&self) -> bool {
        (**self).supports_savepoints()
    }
}
