//! Route declarations.
//!
//! Routes can be declared in code with [`RouteDefinition`] or loaded from a
//! TOML or JSON file:
//!
//! ```toml
//! [[routes]]
//! name = "admin"
//! pattern = "admin(/<controller>(/<action>(/<id>)))"
//! defaults = { controller = "dashboard" }
//! constraints = { id = "[0-9]+" }
//!
//! [[routes]]
//! name = "default"
//! pattern = "(<controller>(/<action>(/<id>)))"
//! defaults = { controller = "welcome", action = "index" }
//! ```
//!
//! File order is registration order.

use std::path::Path;

use serde::{Deserialize, Serialize};

use waypost_core::{WaypostError, WaypostResult};

use crate::constraints::ConstraintTable;
use crate::pattern::{Params, RouteOptions};
use crate::registry::RouteTable;

/// A route as declared by the application, before compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Registration name. A synthesized ordinal name is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The route pattern.
    pub pattern: String,
    /// Default parameter values.
    #[serde(default)]
    pub defaults: Params,
    /// Constraint overrides.
    #[serde(default)]
    pub constraints: ConstraintTable,
}

impl RouteDefinition {
    /// Creates an unnamed definition for `pattern`.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            name: None,
            pattern: pattern.into(),
            defaults: Params::new(),
            constraints: ConstraintTable::new(),
        }
    }

    /// Sets the registration name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a default value.
    #[must_use]
    pub fn default_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Adds a constraint.
    #[must_use]
    pub fn constraint(mut self, name: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.constraints.insert(name, fragment);
        self
    }

    /// Returns the compile options for this definition.
    pub fn options(&self) -> RouteOptions {
        RouteOptions {
            defaults: self.defaults.clone(),
            constraints: self.constraints.clone(),
        }
    }
}

#[derive(Deserialize)]
struct RoutesFile {
    #[serde(default)]
    routes: Vec<RouteDefinition>,
}

/// Parses route definitions from a TOML document with a `[[routes]]` array.
///
/// # Errors
///
/// Returns a configuration error if the TOML is malformed.
pub fn routes_from_toml_str(toml_str: &str) -> WaypostResult<Vec<RouteDefinition>> {
    toml::from_str::<RoutesFile>(toml_str)
        .map(|file| file.routes)
        .map_err(|e| WaypostError::ConfigurationError(format!("Failed to parse routes TOML: {e}")))
}

/// Parses route definitions from a JSON document of the form `{"routes": [...]}`.
///
/// # Errors
///
/// Returns a configuration error if the JSON is malformed.
pub fn routes_from_json_str(json_str: &str) -> WaypostResult<Vec<RouteDefinition>> {
    serde_json::from_str::<RoutesFile>(json_str)
        .map(|file| file.routes)
        .map_err(|e| WaypostError::ConfigurationError(format!("Failed to parse routes JSON: {e}")))
}

/// Loads route definitions from a `.toml` or `.json` file.
///
/// # Errors
///
/// Returns a configuration error if the file cannot be read, has another
/// extension, or is malformed.
pub fn routes_from_file(path: impl AsRef<Path>) -> WaypostResult<Vec<RouteDefinition>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        WaypostError::ConfigurationError(format!(
            "Failed to read routes file '{}': {e}",
            path.display()
        ))
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => routes_from_toml_str(&content),
        Some("json") => routes_from_json_str(&content),
        _ => Err(WaypostError::ConfigurationError(format!(
            "Unsupported routes file '{}': expected .toml or .json",
            path.display()
        ))),
    }
}

/// Compiles `definitions` into a table in order.
///
/// A definition that fails to compile is skipped and its error collected; the
/// remaining definitions still register.
pub fn build_table(definitions: &[RouteDefinition]) -> (RouteTable, Vec<WaypostError>) {
    let mut table = RouteTable::new();
    let mut errors = Vec::new();

    for definition in definitions {
        if let Err(e) = table.register(
            definition.name.as_deref(),
            &definition.pattern,
            &definition.options(),
        ) {
            errors.push(e);
        }
    }

    (table, errors)
}
