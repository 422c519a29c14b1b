//! `txscope` Core
//!
//! This crate provides the shared vocabulary of the `txscope` workspace: the
//! propagation modes a transactional scope can request, the definition a scope
//! is entered with, identifier types, and the coordinator-level error type.
//!
//! # Modules
//!
//! - [`types`] - Identifiers, propagation modes, isolation levels, definitions
//! - [`error`] - Validation errors for core types
//! - [`transaction`] - Transaction error types

pub mod error;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use error::CoreError;
pub use transaction::{TransactionError, TransactionResult};
pub use types::{Isolation, Propagation, ScopeId, TransactionDefinition, TransactionId};
