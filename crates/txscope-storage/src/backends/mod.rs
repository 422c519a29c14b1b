//! Resource manager backend implementations.
//!
//! - [`MemoryResourceManager`] - In-memory tables with buffered transactions

pub mod memory;

pub use memory::MemoryResourceManager;
