//! `txscope` Storage
//!
//! This crate defines the resource manager contract the propagation coordinator
//! drives, plus an in-memory backend.
//!
//! # Overview
//!
//! The coordinator never touches data itself. It asks a [`ResourceManager`] to
//! begin, commit, and roll back physical transactions, and to create, roll back
//! to, or release savepoints inside them. Everything else (the actual reads and
//! writes) goes through backend-specific APIs using the physical handle the
//! coordinator exposes for the current scope.
//!
//! # Error Handling
//!
//! All contract operations return [`ResourceResult<T>`], an alias for
//! `Result<T, ResourceError>`. The coordinator propagates these unchanged.
//!
//! # Example
//!
//! ```
//! use txscope_core::TransactionDefinition;
//! use txscope_storage::backends::MemoryResourceManager;
//! use txscope_storage::ResourceManager;
//!
//! let rm = MemoryResourceManager::new();
//! let tx = rm.begin(&TransactionDefinition::required()).unwrap();
//! rm.put(&tx, "members", b"alice", b"1").unwrap();
//!
//! let sp = rm.create_savepoint(&tx).unwrap();
//! rm.put(&tx, "members", b"bob", b"2").unwrap();
//! rm.rollback_to_savepoint(&tx, &sp).unwrap();
//!
//! rm.commit(&tx).unwrap();
//! assert_eq!(rm.committed("members", b"alice").unwrap(), Some(b"1".to_vec()));
//! assert_eq!(rm.committed("members", b"bob").unwrap(), None);
//! ```
//!
//! # Modules
//!
//! - [`engine`] - The resource manager trait and error type
//! - [`backends`] - Concrete resource manager implementations

pub mod backends;
pub mod engine;

pub use engine::{ResourceError, ResourceManager, ResourceOp, ResourceResult};
