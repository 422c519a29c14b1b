//! `txscope` - Nested Transaction Propagation
//!
//! `txscope` decides, for each scope in a chain of nested logical operations,
//! whether it joins the transaction already open, begins an independent one,
//! opens a savepoint, or runs without a transaction. It tracks rollback intent
//! across the chain so that a failure deep in the call graph either unwinds the
//! whole physical transaction or only the savepoint that contained it.
//!
//! # Propagation
//!
//! | mode            | no current transaction   | current transaction exists       |
//! |-----------------|--------------------------|----------------------------------|
//! | `Required`      | begin physical           | join                             |
//! | `RequiresNew`   | begin physical           | suspend, begin physical          |
//! | `Nested`        | begin physical           | savepoint                        |
//! | `Supports`      | run without transaction  | join                             |
//! | `NotSupported`  | run without transaction  | suspend, run without transaction |
//! | `Mandatory`     | fail: no transaction     | join                             |
//! | `Never`         | run without transaction  | fail: existing transaction       |
//!
//! # Rollback-only
//!
//! A scope that fails, or asks for a rollback, marks the transaction it belongs
//! to rollback-only. Joined scopes mark the scope that owns the physical
//! transaction; nested scopes own their savepoint and keep the mark to
//! themselves. When the owner of a physical transaction completes normally but
//! finds the mark set by someone else, it rolls back and returns
//! [`TransactionError::SilentRollback`](txscope_core::TransactionError::SilentRollback)
//! rather than pretending the commit happened.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use txscope::{Error, TransactionCoordinator};
//! use txscope_core::TransactionDefinition;
//! use txscope_storage::backends::MemoryResourceManager;
//!
//! let rm = Arc::new(MemoryResourceManager::new());
//! let mut coordinator = TransactionCoordinator::new(Arc::clone(&rm));
//!
//! let result: Result<(), Error> = coordinator.execute(&TransactionDefinition::required(), |c| {
//!     // An inner scope fails; the caller swallows the failure.
//!     let _ = c.execute(&TransactionDefinition::required(), |_| {
//!         Err::<(), _>(Error::from(txscope_core::TransactionError::NoScope))
//!     });
//!     Ok(())
//! });
//!
//! assert!(result.unwrap_err().is_silent_rollback());
//! ```
//!
//! # Modules
//!
//! - [`coordinator`] - Entering and exiting scopes
//! - [`resolver`] - The propagation decision table
//! - [`context`] / [`stack`] - Per-scope state and the per-chain scope stack
//! - [`interceptor`] - Explicit decoration of service operations
//! - [`config`] - Coordinator configuration
//! - [`error`] - Error types

pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod interceptor;
pub mod resolver;
pub mod stack;

pub use config::CoordinatorConfig;
pub use context::{ContextKind, TransactionContext};
pub use coordinator::{Outcome, ScopeHandle, TransactionCoordinator};
pub use error::{Error, Result};
pub use interceptor::{Transactional, TransactionInterceptor};
pub use resolver::{resolve, Action};

pub use txscope_core::{Isolation, Propagation, TransactionDefinition, TransactionError};
pub use txscope_storage::{ResourceError, ResourceManager};
