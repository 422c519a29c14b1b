//! Propagation modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// How a transactional scope relates to the transaction already in progress.
///
/// The set is fixed. Each mode defines what happens both when a transaction is
/// current and when none is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Propagation {
    /// Join the current transaction, or begin a new one if none exists.
    #[default]
    Required,

    /// Always begin a new physical transaction, suspending the current one.
    RequiresNew,

    /// Open a savepoint inside the current transaction, or behave like
    /// [`Propagation::Required`] if none exists.
    Nested,

    /// Join the current transaction if one exists, otherwise run without one.
    Supports,

    /// Run without a transaction, suspending the current one if any.
    NotSupported,

    /// Join the current transaction; fail if none exists.
    Mandatory,

    /// Run without a transaction; fail if one exists.
    Never,
}

impl Propagation {
    /// Every propagation mode, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Required,
        Self::RequiresNew,
        Self::Nested,
        Self::Supports,
        Self::NotSupported,
        Self::Mandatory,
        Self::Never,
    ];

    /// Returns the canonical upper-case name of this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "REQUIRED",
            Self::RequiresNew => "REQUIRES_NEW",
            Self::Nested => "NESTED",
            Self::Supports => "SUPPORTS",
            Self::NotSupported => "NOT_SUPPORTED",
            Self::Mandatory => "MANDATORY",
            Self::Never => "NEVER",
        }
    }

    /// Returns `true` if this mode suspends a current transaction.
    #[must_use]
    pub const fn suspends_current(self) -> bool {
        matches!(self, Self::RequiresNew | Self::NotSupported)
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Propagation {
    type Err = CoreError;

    /// Parses a mode name, ignoring case and accepting `-` in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| CoreError::parse("propagation", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_relaxed_names() {
        assert_eq!("REQUIRES_NEW".parse::<Propagation>(), Ok(Propagation::RequiresNew));
        assert_eq!("not-supported".parse::<Propagation>(), Ok(Propagation::NotSupported));
        assert_eq!(" nested ".parse::<Propagation>(), Ok(Propagation::Nested));
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "sometimes".parse::<Propagation>().unwrap_err();
        assert_eq!(err.to_string(), "invalid propagation: 'sometimes'");
    }

    #[test]
    fn display_matches_serde_name() {
        for mode in Propagation::ALL {
            let json = serde_json::to_string(&mode).expect("serialize");
            assert_eq!(json, format!("\"{mode}\""));
        }
    }

    #[test]
    fn only_requires_new_and_not_supported_suspend() {
        let suspending: Vec<_> =
            Propagation::ALL.into_iter().filter(|mode| mode.suspends_current()).collect();
        assert_eq!(suspending, vec![Propagation::RequiresNew, Propagation::NotSupported]);
    }
}
