//! Core types shared by the coordinator and resource managers.

mod definition;
mod id;
mod propagation;

pub use definition::{Isolation, TransactionDefinition};
pub use id::{ScopeId, TransactionId};
pub use propagation::Propagation;
