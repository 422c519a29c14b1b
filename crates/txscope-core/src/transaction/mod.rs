//! Transaction error types for `txscope`.
//!
//! These errors describe propagation decisions the coordinator refuses or
//! outcomes it must surface. Resource-level failures live in
//! `txscope-storage`; the `txscope` crate combines both into its own error type.
//!
//! # Error Kinds
//!
//! - **Rejected entry**: [`TransactionError::NoTransaction`] (MANDATORY without a
//!   transaction) and [`TransactionError::ExistingTransaction`] (NEVER inside one).
//!   Both are raised before any state changes.
//! - **Silent rollback**: [`TransactionError::SilentRollback`] is raised by the
//!   scope that owns a physical transaction when it completes normally but an
//!   inner participating scope had marked the transaction rollback-only.
//! - **Usage errors**: exits out of order, or rollback requests with no scope.

mod error;

pub use error::{TransactionError, TransactionResult};
