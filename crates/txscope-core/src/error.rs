//! Error types for the core crate.

use thiserror::Error;

/// Errors that can occur in the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A textual value could not be parsed into a core type.
    #[error("invalid {kind}: '{value}'")]
    Parse {
        /// The kind of value being parsed.
        kind: &'static str,
        /// The input that failed to parse.
        value: String,
    },
}

impl CoreError {
    /// Creates a parse error for the given kind of value.
    #[must_use]
    pub fn parse(kind: &'static str, value: impl Into<String>) -> Self {
        Self::Parse { kind, value: value.into() }
    }
}
