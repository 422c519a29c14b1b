//! In-memory resource manager.
//!
//! Committed data lives in ordered in-memory tables. Each physical transaction
//! buffers its writes until commit, which gives read-your-own-writes inside the
//! transaction and isolation from every other transaction. Savepoints are
//! positions in that buffer.
//!
//! The manager also keeps a journal of every successful contract call, and can
//! be told to fail the next call of a given operation, which makes it the test
//! double of choice for coordinator tests.

mod buffer;
mod manager;

pub use buffer::{WriteBuffer, WriteOp};
pub use manager::{MemoryResourceManager, ResourceCall, SavepointId, TxHandle};
