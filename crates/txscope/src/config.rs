//! Coordinator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`TransactionCoordinator`](crate::TransactionCoordinator).
///
/// The configuration derives `serde` traits with `#[serde(default)]`, so an
/// embedding application can load it from its own configuration file and leave
/// out any field it does not care about.
///
/// # Example
///
/// ```
/// use txscope::CoordinatorConfig;
///
/// let config = CoordinatorConfig::new().nested_transaction_allowed(false);
///
/// assert!(!config.nested_transaction_allowed);
/// assert!(config.global_rollback_on_participation_failure);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Whether NESTED may open savepoints inside an existing transaction.
    /// Default: true.
    pub nested_transaction_allowed: bool,

    /// Whether a participating scope that fails marks the whole transaction
    /// rollback-only. Explicit rollback requests always do.
    /// Default: true.
    pub global_rollback_on_participation_failure: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            nested_transaction_allowed: true,
            global_rollback_on_participation_failure: true,
        }
    }
}

impl CoordinatorConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow or forbid NESTED inside an existing transaction.
    #[must_use]
    pub const fn nested_transaction_allowed(mut self, allowed: bool) -> Self {
        self.nested_transaction_allowed = allowed;
        self
    }

    /// Set whether participating failures mark the whole transaction.
    #[must_use]
    pub const fn global_rollback_on_participation_failure(mut self, enabled: bool) -> Self {
        self.global_rollback_on_participation_failure = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: CoordinatorConfig =
            serde_json::from_str(r#"{"nested_transaction_allowed":false}"#).expect("valid config");
        assert_eq!(config, CoordinatorConfig::new().nested_transaction_allowed(false));
    }

    #[test]
    fn empty_document_is_default() {
        let config: CoordinatorConfig = serde_json::from_str("{}").expect("valid config");
        assert_eq!(config, CoordinatorConfig::default());
    }
}
