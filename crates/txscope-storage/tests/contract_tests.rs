//! Tests for the resource manager contract.
//!
//! The suite is written against [`ResourceManager`] alone plus a small harness
//! for reading and writing data, so any backend can be checked with it.

use txscope_core::{Isolation, TransactionDefinition};
use txscope_storage::backends::MemoryResourceManager;
use txscope_storage::{ResourceError, ResourceManager, ResourceOp, ResourceResult};

/// A test harness for resource manager implementations.
pub trait TestHarness {
    /// The manager being tested.
    type Manager: ResourceManager;

    /// Create a fresh manager.
    fn create() -> Self::Manager;

    /// Buffer a write of `key` inside `handle`.
    fn write(
        rm: &Self::Manager,
        handle: &<Self::Manager as ResourceManager>::Handle,
        key: &str,
    ) -> ResourceResult<()>;

    /// Whether `key` is committed.
    fn committed(rm: &Self::Manager, key: &str) -> ResourceResult<bool>;
}

/// Run the standard contract suite against a harness.
pub fn run_test_suite<H: TestHarness>() {
    test_commit_publishes_writes::<H>();
    test_rollback_discards_writes::<H>();
    test_savepoint_rollback_discards_later_writes::<H>();
    test_release_keeps_writes::<H>();
    test_rollback_to_outer_savepoint_drops_inner::<H>();
    test_finished_handle_rejected::<H>();
}

fn begin<H: TestHarness>(rm: &H::Manager) -> <H::Manager as ResourceManager>::Handle {
    rm.begin(&TransactionDefinition::required()).expect("begin")
}

fn committed<H: TestHarness>(rm: &H::Manager, key: &str) -> bool {
    H::committed(rm, key).expect("committed read")
}

fn test_commit_publishes_writes<H: TestHarness>() {
    let rm = H::create();
    let tx = begin::<H>(&rm);
    H::write(&rm, &tx, "a").expect("write");
    assert!(!committed::<H>(&rm, "a"));

    rm.commit(&tx).expect("commit");
    assert!(committed::<H>(&rm, "a"));
}

fn test_rollback_discards_writes<H: TestHarness>() {
    let rm = H::create();
    let tx = begin::<H>(&rm);
    H::write(&rm, &tx, "a").expect("write");
    rm.rollback(&tx).expect("rollback");
    assert!(!committed::<H>(&rm, "a"));
}

fn test_savepoint_rollback_discards_later_writes<H: TestHarness>() {
    let rm = H::create();
    let tx = begin::<H>(&rm);
    H::write(&rm, &tx, "before").expect("write");
    let sp = rm.create_savepoint(&tx).expect("savepoint");
    H::write(&rm, &tx, "after").expect("write");

    rm.rollback_to_savepoint(&tx, &sp).expect("rollback to savepoint");
    rm.commit(&tx).expect("commit");

    assert!(committed::<H>(&rm, "before"));
    assert!(!committed::<H>(&rm, "after"));
}

fn test_release_keeps_writes<H: TestHarness>() {
    let rm = H::create();
    let tx = begin::<H>(&rm);
    let sp = rm.create_savepoint(&tx).expect("savepoint");
    H::write(&rm, &tx, "a").expect("write");

    rm.release_savepoint(&tx, &sp).expect("release");
    assert!(rm.rollback_to_savepoint(&tx, &sp).is_err(), "released savepoint is gone");
    rm.commit(&tx).expect("commit");
    assert!(committed::<H>(&rm, "a"));
}

fn test_rollback_to_outer_savepoint_drops_inner<H: TestHarness>() {
    let rm = H::create();
    let tx = begin::<H>(&rm);
    let outer = rm.create_savepoint(&tx).expect("outer savepoint");
    H::write(&rm, &tx, "a").expect("write");
    let inner = rm.create_savepoint(&tx).expect("inner savepoint");
    H::write(&rm, &tx, "b").expect("write");

    rm.rollback_to_savepoint(&tx, &outer).expect("rollback to outer");
    assert!(rm.release_savepoint(&tx, &inner).is_err(), "inner savepoint is gone");
    rm.commit(&tx).expect("commit");

    assert!(!committed::<H>(&rm, "a"));
    assert!(!committed::<H>(&rm, "b"));
}

fn test_finished_handle_rejected<H: TestHarness>() {
    let rm = H::create();
    let tx = begin::<H>(&rm);
    rm.commit(&tx).expect("commit");
    assert!(rm.commit(&tx).is_err());
    assert!(rm.rollback(&tx).is_err());
    assert!(rm.create_savepoint(&tx).is_err());
}

// ============================================================================
// In-memory backend
// ============================================================================

struct MemoryHarness;

impl TestHarness for MemoryHarness {
    type Manager = MemoryResourceManager;

    fn create() -> MemoryResourceManager {
        MemoryResourceManager::new()
    }

    fn write(
        rm: &MemoryResourceManager,
        handle: &<MemoryResourceManager as ResourceManager>::Handle,
        key: &str,
    ) -> ResourceResult<()> {
        rm.put(handle, "t", key.as_bytes(), b"1")
    }

    fn committed(rm: &MemoryResourceManager, key: &str) -> ResourceResult<bool> {
        Ok(rm.committed("t", key.as_bytes())?.is_some())
    }
}

#[test]
fn test_memory_compliance() {
    run_test_suite::<MemoryHarness>();
}

#[test]
fn test_memory_journal_records_successful_calls() {
    let rm = MemoryResourceManager::new();
    let tx = rm.begin(&TransactionDefinition::required()).expect("begin");
    let sp = rm.create_savepoint(&tx).expect("savepoint");
    rm.release_savepoint(&tx, &sp).expect("release");
    rm.inject_failure(ResourceOp::Commit).expect("inject");
    assert_eq!(rm.commit(&tx), Err(ResourceError::Injected { operation: ResourceOp::Commit }));
    rm.commit(&tx).expect("second commit");

    assert_eq!(
        rm.call_ops().expect("ops"),
        vec![
            ResourceOp::Begin,
            ResourceOp::CreateSavepoint,
            ResourceOp::ReleaseSavepoint,
            ResourceOp::Commit
        ]
    );
    let calls = rm.calls().expect("calls");
    assert!(calls.iter().all(|call| call.handle() == tx));
}

#[test]
fn test_memory_without_savepoints() {
    let rm = MemoryResourceManager::without_savepoints();
    assert!(!rm.supports_savepoints());
    let tx = rm.begin(&TransactionDefinition::required()).expect("begin");
    assert_eq!(rm.create_savepoint(&tx), Err(ResourceError::SavepointsUnsupported));
}

#[test]
fn test_memory_keeps_isolation_and_deletes() {
    let rm = MemoryResourceManager::new();
    rm.put_auto_commit("t", b"k", b"v").expect("seed");

    let tx = rm
        .begin(&TransactionDefinition::required().with_isolation(Isolation::Serializable))
        .expect("begin");
    assert_eq!(rm.isolation(&tx).expect("isolation"), Isolation::Serializable);

    rm.delete(&tx, "t", b"k").expect("delete");
    assert_eq!(rm.get(&tx, "t", b"k").expect("get"), None);
    assert_eq!(rm.committed("t", b"k").expect("committed"), Some(b"v".to_vec()));

    rm.commit(&tx).expect("commit");
    assert_eq!(rm.committed_len("t").expect("len"), 0);
}

#[test]
fn test_shared_manager_across_threads() {
    use std::sync::Arc;
    use std::thread;

    let rm = Arc::new(MemoryResourceManager::new());
    let workers: Vec<_> = (0..4u8)
        .map(|i| {
            let rm = Arc::clone(&rm);
            thread::spawn(move || {
                let tx = rm.begin(&TransactionDefinition::required()).expect("begin");
                rm.put(&tx, "t", &[i], b"1").expect("put");
                rm.commit(&tx).expect("commit");
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("thread");
    }
    assert_eq!(rm.committed_len("t").expect("len"), 4);
}
