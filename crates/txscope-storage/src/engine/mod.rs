//! Resource manager traits and abstractions.
//!
//! This module defines the contract that transactional backends implement so
//! the coordinator can drive them.

mod error;
mod traits;

pub use error::{ResourceError, ResourceOp, ResourceResult};
pub use traits::ResourceManager;
