//! The in-memory resource manager.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use tracing::trace;
use txscope_core::{Isolation, TransactionDefinition};

use super::buffer::WriteBuffer;
use crate::engine::{ResourceError, ResourceManager, ResourceOp, ResourceResult};

/// Handle of one physical transaction in a [`MemoryResourceManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHandle(u64);

impl TxHandle {
    /// Get the raw u64 value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mem-tx-{}", self.0)
    }
}

/// Savepoint inside one [`TxHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SavepointId(u32);

impl SavepointId {
    /// Get the raw u32 value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SavepointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SAVEPOINT_{}", self.0)
    }
}

/// One successful call of the resource manager contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceCall {
    /// A physical transaction was begun.
    Begin(TxHandle),
    /// A physical transaction was committed.
    Commit(TxHandle),
    /// A physical transaction was rolled back.
    Rollback(TxHandle),
    /// A savepoint was created.
    CreateSavepoint(TxHandle, SavepointId),
    /// Work was rolled back to a savepoint.
    RollbackToSavepoint(TxHandle, SavepointId),
    /// A savepoint was released.
    ReleaseSavepoint(TxHandle, SavepointId),
}

impl ResourceCall {
    /// The contract operation this call performed.
    #[must_use]
    pub const fn op(&self) -> ResourceOp {
        match self {
            Self::Begin(_) => ResourceOp::Begin,
            Self::Commit(_) => ResourceOp::Commit,
            Self::Rollback(_) => ResourceOp::Rollback,
            Self::CreateSavepoint(..) => ResourceOp::CreateSavepoint,
            Self::RollbackToSavepoint(..) => ResourceOp::RollbackToSavepoint,
            Self::ReleaseSavepoint(..) => ResourceOp::ReleaseSavepoint,
        }
    }

    /// The physical transaction this call targeted.
    #[must_use]
    pub const fn handle(&self) -> TxHandle {
        match self {
            Self::Begin(h)
            | Self::Commit(h)
            | Self::Rollback(h)
            | Self::CreateSavepoint(h, _)
            | Self::RollbackToSavepoint(h, _)
            | Self::ReleaseSavepoint(h, _) => *h,
        }
    }
}

type Tables = BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>;

#[derive(Debug)]
struct ActiveTx {
    buffer: WriteBuffer,
    /// Savepoints in creation order, with the buffer length at creation.
    savepoints: Vec<(SavepointId, usize)>,
    next_savepoint: u32,
    read_only: bool,
    isolation: Isolation,
}

impl ActiveTx {
    fn savepoint_index(&self, savepoint: SavepointId) -> ResourceResult<usize> {
        self.savepoints
            .iter()
            .position(|(id, _)| *id == savepoint)
            .ok_or_else(|| ResourceError::UnknownSavepoint(savepoint.to_string()))
    }
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    active: HashMap<TxHandle, ActiveTx>,
    next_tx: u64,
    calls: Vec<ResourceCall>,
    injected: Vec<ResourceOp>,
}

impl State {
    /// Consume a pending injected failure for `op`, if any.
    fn check_injected(&mut self, op: ResourceOp) -> ResourceResult<()> {
        if let Some(pos) = self.injected.iter().position(|pending| *pending == op) {
            self.injected.remove(pos);
            return Err(ResourceError::Injected { operation: op });
        }
        Ok(())
    }

    fn tx(&self, handle: TxHandle) -> ResourceResult<&ActiveTx> {
        self.active.get(&handle).ok_or_else(|| ResourceError::UnknownTransaction(handle.to_string()))
    }

    fn tx_mut(&mut self, handle: TxHandle) -> ResourceResult<&mut ActiveTx> {
        self.active
            .get_mut(&handle)
            .ok_or_else(|| ResourceError::UnknownTransaction(handle.to_string()))
    }

    fn writable_tx(&mut self, handle: TxHandle) -> ResourceResult<&mut ActiveTx> {
        let tx = self.tx_mut(handle)?;
        if tx.read_only {
            return Err(ResourceError::ReadOnly);
        }
        Ok(tx)
    }
}

/// A resource manager keeping all data in memory.
///
/// # Thread Safety
///
/// All state sits behind one mutex, so the manager is `Send + Sync` and can be
/// shared through an `Arc` by any number of coordinators.
///
/// # Example
///
/// ```
/// use txscope_core::TransactionDefinition;
/// use txscope_storage::backends::MemoryResourceManager;
/// use txscope_storage::ResourceManager;
///
/// let rm = MemoryResourceManager::new();
/// let tx = rm.begin(&TransactionDefinition::required()).unwrap();
/// rm.put(&tx, "log", b"1", b"joined").unwrap();
/// rm.rollback(&tx).unwrap();
///
/// assert_eq!(rm.committed_len("log").unwrap(), 0);
/// ```
#[derive(Debug)]
pub struct MemoryResourceManager {
    state: Mutex<State>,
    savepoints: bool,
}

impl Default for MemoryResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryResourceManager {
    /// Create an empty manager with savepoint support.
    #[must_use]
    pub fn new() -> Self {
        Self { state: Mutex::new(State::default()), savepoints: true }
    }

    /// Create an empty manager that refuses to create savepoints.
    #[must_use]
    pub fn without_savepoints() -> Self {
        Self { state: Mutex::new(State::default()), savepoints: false }
    }

    fn lock(&self) -> ResourceResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|e| ResourceError::LockPoisoned(e.to_string()))
    }

    // ========================================================================
    // Data access
    // ========================================================================

    /// Buffer a put inside the given transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown or the transaction is read-only.
    pub fn put(&self, handle: &TxHandle, table: &str, key: &[u8], value: &[u8]) -> ResourceResult<()> {
        let mut state = self.lock()?;
        state.writable_tx(*handle)?.buffer.put(table, key, value.to_vec());
        Ok(())
    }

    /// Buffer a delete inside the given transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown or the transaction is read-only.
    pub fn delete(&self, handle: &TxHandle, table: &str, key: &[u8]) -> ResourceResult<()> {
        let mut state = self.lock()?;
        state.writable_tx(*handle)?.buffer.delete(table, key);
        Ok(())
    }

    /// Read a key as seen from inside the given transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown.
    pub fn get(&self, handle: &TxHandle, table: &str, key: &[u8]) -> ResourceResult<Option<Vec<u8>>> {
        let state = self.lock()?;
        let tx = state.tx(*handle)?;
        if let Some(buffered) = tx.buffer.get(table, key) {
            return Ok(buffered.map(<[u8]>::to_vec));
        }
        Ok(state.tables.get(table).and_then(|rows| rows.get(key)).cloned())
    }

    /// Write a key directly to committed state, outside any transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn put_auto_commit(&self, table: &str, key: &[u8], value: &[u8]) -> ResourceResult<()> {
        let mut state = self.lock()?;
        state.tables.entry(table.to_owned()).or_default().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    /// Read a key from committed state.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn committed(&self, table: &str, key: &[u8]) -> ResourceResult<Option<Vec<u8>>> {
        let state = self.lock()?;
        Ok(state.tables.get(table).and_then(|rows| rows.get(key)).cloned())
    }

    /// Number of committed rows in a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn committed_len(&self, table: &str) -> ResourceResult<usize> {
        let state = self.lock()?;
        Ok(state.tables.get(table).map_or(0, BTreeMap::len))
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Every successful contract call so far, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn calls(&self) -> ResourceResult<Vec<ResourceCall>> {
        Ok(self.lock()?.calls.clone())
    }

    /// Operations of every successful contract call so far, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn call_ops(&self) -> ResourceResult<Vec<ResourceOp>> {
        Ok(self.lock()?.calls.iter().map(ResourceCall::op).collect())
    }

    /// Number of physical transactions that are neither committed nor rolled back.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn active_count(&self) -> ResourceResult<usize> {
        Ok(self.lock()?.active.len())
    }

    /// Isolation level the given transaction was begun with.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown.
    pub fn isolation(&self, handle: &TxHandle) -> ResourceResult<Isolation> {
        Ok(self.lock()?.tx(*handle)?.isolation)
    }

    /// Make the next call of `op` fail with [`ResourceError::Injected`].
    ///
    /// Injections queue up: injecting the same operation twice fails its next
    /// two calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn inject_failure(&self, op: ResourceOp) -> ResourceResult<()> {
        self.lock()?.injected.push(op);
        Ok(())
    }
}

impl ResourceManager for MemoryResourceManager {
    type Handle = TxHandle;
    type Savepoint = SavepointId;

    fn begin(&self, definition: &TransactionDefinition) -> ResourceResult<TxHandle> {
        let mut state = self.lock()?;
        state.check_injected(ResourceOp::Begin)?;

        state.next_tx += 1;
        let handle = TxHandle(state.next_tx);
        state.active.insert(
            handle,
            ActiveTx {
                buffer: WriteBuffer::new(),
                savepoints: Vec::new(),
                next_savepoint: 0,
                read_only: definition.read_only,
                isolation: definition.isolation,
            },
        );
        state.calls.push(ResourceCall::Begin(handle));
        trace!(%handle, read_only = definition.read_only, "begin");
        Ok(handle)
    }

    fn commit(&self, handle: &TxHandle) -> ResourceResult<()> {
        let mut state = self.lock()?;
        state.tx(*handle)?;
        state.check_injected(ResourceOp::Commit)?;

        let tx = state
            .active
            .remove(handle)
            .ok_or_else(|| ResourceError::UnknownTransaction(handle.to_string()))?;
        let writes = tx.buffer.len();
        tx.buffer.apply_to(&mut state.tables);
        state.calls.push(ResourceCall::Commit(*handle));
        trace!(%handle, writes, "commit");
        Ok(())
    }

    fn rollback(&self, handle: &TxHandle) -> ResourceResult<()> {
        let mut state = self.lock()?;
        state.tx(*handle)?;
        state.check_injected(ResourceOp::Rollback)?;

        state.active.remove(handle);
        state.calls.push(ResourceCall::Rollback(*handle));
        trace!(%handle, "rollback");
        Ok(())
    }

    fn create_savepoint(&self, handle: &TxHandle) -> ResourceResult<SavepointId> {
        if !self.savepoints {
            return Err(ResourceError::SavepointsUnsupported);
        }
        let mut state = self.lock()?;
        state.tx(*handle)?;
        state.check_injected(ResourceOp::CreateSavepoint)?;

        let tx = state.tx_mut(*handle)?;
        tx.next_savepoint += 1;
        let savepoint = SavepointId(tx.next_savepoint);
        let mark = tx.buffer.len();
        tx.savepoints.push((savepoint, mark));
        state.calls.push(ResourceCall::CreateSavepoint(*handle, savepoint));
        trace!(%handle, %savepoint, mark, "create savepoint");
        Ok(savepoint)
    }

    fn rollback_to_savepoint(&self, handle: &TxHandle, savepoint: &SavepointId) -> ResourceResult<()> {
        let mut state = self.lock()?;
        state.tx(*handle)?.savepoint_index(*savepoint)?;
        state.check_injected(ResourceOp::RollbackToSavepoint)?;

        let tx = state.tx_mut(*handle)?;
        let index = tx.savepoint_index(*savepoint)?;
        let (_, mark) = tx.savepoints[index];
        tx.savepoints.truncate(index);
        tx.buffer.truncate(mark);
        state.calls.push(ResourceCall::RollbackToSavepoint(*handle, *savepoint));
        trace!(%handle, %savepoint, "rollback to savepoint");
        Ok(())
    }

    fn release_savepoint(&self, handle: &TxHandle, savepoint: &SavepointId) -> ResourceResult<()> {
        let mut state = self.lock()?;
        state.tx(*handle)?.savepoint_index(*savepoint)?;
        state.check_injected(ResourceOp::ReleaseSavepoint)?;

        let tx = state.tx_mut(*handle)?;
        let index = tx.savepoint_index(*savepoint)?;
        tx.savepoints.truncate(index);
        state.calls.push(ResourceCall::ReleaseSavepoint(*handle, *savepoint));
        trace!(%handle, %savepoint, "release savepoint");
        Ok(())
    }

    fn supports_savepoints(&self) -> bool {
        self.savepoints
    }
}
