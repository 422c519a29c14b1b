//! Transaction definitions.

use serde::{Deserialize, Serialize};

use super::Propagation;

/// Isolation level requested for a new physical transaction.
///
/// The coordinator passes the level through to the resource manager untouched;
/// scopes that join or nest inside an existing transaction inherit its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// Use the resource manager's default level.
    #[default]
    Default,
    /// Dirty reads allowed.
    ReadUncommitted,
    /// Only committed data is visible.
    ReadCommitted,
    /// Rows read once stay stable for the rest of the transaction.
    RepeatableRead,
    /// Full serializability.
    Serializable,
}

/// Describes how a scope wants to run.
///
/// # Example
///
/// ```
/// use txscope_core::{Isolation, Propagation, TransactionDefinition};
///
/// let def = TransactionDefinition::new(Propagation::RequiresNew)
///     .with_name("audit")
///     .with_isolation(Isolation::Serializable)
///     .read_only(true);
///
/// assert_eq!(def.propagation, Propagation::RequiresNew);
/// assert_eq!(def.name.as_deref(), Some("audit"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionDefinition {
    /// The requested propagation mode.
    pub propagation: Propagation,

    /// Isolation level for a newly begun physical transaction.
    pub isolation: Isolation,

    /// Whether a newly begun physical transaction should reject writes.
    pub read_only: bool,

    /// Optional name used when logging this scope.
    pub name: Option<String>,
}

impl TransactionDefinition {
    /// Create a definition with the given propagation and defaults elsewhere.
    #[must_use]
    pub const fn new(propagation: Propagation) -> Self {
        Self { propagation, isolation: Isolation::Default, read_only: false, name: None }
    }

    /// Shorthand for [`Propagation::Required`].
    #[must_use]
    pub const fn required() -> Self {
        Self::new(Propagation::Required)
    }

    /// Shorthand for [`Propagation::RequiresNew`].
    #[must_use]
    pub const fn requires_new() -> Self {
        Self::new(Propagation::RequiresNew)
    }

    /// Shorthand for [`Propagation::Nested`].
    #[must_use]
    pub const fn nested() -> Self {
        Self::new(Propagation::Nested)
    }

    /// Set the scope name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the isolation level.
    #[must_use]
    pub const fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// Set the read-only flag.
    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Name used in log output: the explicit name, or the propagation mode.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.propagation.as_str())
    }
}

impl From<Propagation> for TransactionDefinition {
    fn from(propagation: Propagation) -> Self {
        Self::new(propagation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_definition_is_required_read_write() {
        let def = TransactionDefinition::default();
        assert_eq!(def.propagation, Propagation::Required);
        assert_eq!(def.isolation, Isolation::Default);
        assert!(!def.read_only);
        assert_eq!(def.display_name(), "REQUIRED");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let def: TransactionDefinition =
            serde_json::from_str(r#"{"propagation":"NESTED","read_only":true}"#)
                .expect("valid definition");
        assert_eq!(def, TransactionDefinition::nested().read_only(true));
    }

    #[test]
    fn explicit_name_wins_for_display() {
        let def = TransactionDefinition::requires_new().with_name("log-writer");
        assert_eq!(def.display_name(), "log-writer");
    }
}
