//! Core error types for waypost.
//!
//! [`WaypostError`] covers pattern compilation, reverse routing, registration,
//! configuration, serialization and I/O failures. A route that simply does not
//! match a path is not an error and never shows up here.

use thiserror::Error;

/// The primary error type for waypost.
#[derive(Error, Debug)]
pub enum WaypostError {
    // ── Routing ──────────────────────────────────────────────────────

    /// A route pattern is malformed.
    #[error("Pattern syntax error in '{pattern}': {reason}")]
    PatternSyntax {
        /// The offending pattern.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Reverse routing could not resolve a mandatory parameter.
    #[error("Missing required parameter '{parameter}' for route '{pattern}'")]
    MissingRequiredParameter {
        /// The pattern of the route being built.
        pattern: String,
        /// The first parameter that could not be resolved.
        parameter: String,
    },

    /// A route failed to register. Wraps the underlying compile error with the
    /// name the route was registered under.
    #[error("Failed to register route '{name}': {source}")]
    RouteRegistration {
        /// The route name (explicit or synthesized).
        name: String,
        /// The underlying error.
        #[source]
        source: Box<WaypostError>,
    },

    /// No route is registered under the requested name.
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl WaypostError {
    /// Builds a [`WaypostError::PatternSyntax`] error.
    pub fn pattern_syntax(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PatternSyntax {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a pattern syntax error, including one wrapped
    /// by a failed registration.
    pub fn is_pattern_error(&self) -> bool {
        match self {
            Self::PatternSyntax { .. } => true,
            Self::RouteRegistration { source, .. } => source.is_pattern_error(),
            _ => false,
        }
    }

    /// Returns the name of the missing parameter if this is a
    /// [`WaypostError::MissingRequiredParameter`] error.
    pub fn missing_parameter(&self) -> Option<&str> {
        match self {
            Self::MissingRequiredParameter { parameter, .. } => Some(parameter),
            _ => None,
        }
    }
}

/// A convenience type alias for `Result<T, WaypostError>`.
pub type WaypostResult<T> = Result<T, WaypostError>;
