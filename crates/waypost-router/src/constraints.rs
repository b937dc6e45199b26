//! Per-route parameter constraints.
//!
//! A constraint is a regex fragment a parameter's value must match. Each
//! parameter resolves its constraint in priority order:
//!
//! 1. the route's [`ConstraintTable`] entry,
//! 2. the inline fragment from `<name:regex>`,
//! 3. [`DEFAULT_SEGMENT`].

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use waypost_core::{WaypostError, WaypostResult};

/// The constraint used when none is given: one or more non-separator characters.
pub const DEFAULT_SEGMENT: &str = "[^/]+";

/// Mapping from parameter name to an allowed-value regex fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintTable(BTreeMap<String, String>);

impl ConstraintTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constraint, replacing any previous one for `name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.insert(name, fragment);
        self
    }

    /// Adds a constraint, replacing any previous one for `name`.
    pub fn insert(&mut self, name: impl Into<String>, fragment: impl Into<String>) {
        self.0.insert(name.into(), fragment.into());
    }

    /// Returns the table entry for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(name, fragment)` entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Resolves the constraint for a parameter.
    pub fn resolve<'a>(&'a self, name: &str, inline: Option<&'a str>) -> &'a str {
        self.get(name).or(inline).unwrap_or(DEFAULT_SEGMENT)
    }

    /// Checks that every fragment is a valid regex on its own, so that a bad
    /// constraint is reported against its parameter rather than as an opaque
    /// failure of the whole route expression.
    ///
    /// # Errors
    ///
    /// Returns [`WaypostError::PatternSyntax`] for the first invalid fragment.
    pub fn validate(&self, pattern: &str) -> WaypostResult<()> {
        for (name, fragment) in self.iter() {
            validate_fragment(pattern, name, fragment)?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConstraintTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Checks a single constraint fragment.
///
/// Empty fragments are rejected: a parameter must always consume at least
/// one character for its capture to be meaningful.
pub(crate) fn validate_fragment(pattern: &str, name: &str, fragment: &str) -> WaypostResult<()> {
    if fragment.is_empty() {
        return Err(WaypostError::pattern_syntax(
            pattern,
            format!("empty constraint for parameter '{name}'"),
        ));
    }
    Regex::new(&format!("^(?:{fragment})$")).map(|_| ()).map_err(|e| {
        WaypostError::pattern_syntax(
            pattern,
            format!("invalid constraint for parameter '{name}': {e}"),
        )
    })
}
