//! Application settings for waypost.
//!
//! [`Settings`] holds the knobs the router and its collaborators read at
//! bootstrap: where generated URLs are rooted, whether the compiled route table
//! is cached on disk, and how logging and sessions are configured.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which session storage backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackendKind {
    /// Session data lives in an in-process store keyed by session id.
    Native,
    /// Session data travels in the cookie value itself.
    Cookie,
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// The storage backend.
    pub backend: SessionBackendKind,
    /// The session (cookie) name.
    pub name: String,
    /// Session lifetime in seconds. `0` means until the browser closes.
    pub lifetime: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            backend: SessionBackendKind::Native,
            name: "session".to_string(),
            lifetime: 0,
        }
    }
}

/// The complete set of waypost settings.
///
/// # Examples
///
/// ```
/// use waypost_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.base_url, "/");
/// assert!(!settings.cache_routes);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled. Selects human-readable log output.
    pub debug: bool,

    // ── URLs ─────────────────────────────────────────────────────────

    /// Base path every generated URL is rooted at.
    pub base_url: String,
    /// Host used for absolute URLs when a protocol is requested.
    pub host: Option<String>,

    // ── Route cache ──────────────────────────────────────────────────

    /// Whether the compiled route table is persisted between runs.
    pub cache_routes: bool,
    /// Directory holding cache entries.
    pub cache_dir: Option<PathBuf>,

    // ── Logging ──────────────────────────────────────────────────────

    /// Tracing filter directive (e.g. "info", "waypost_router=debug").
    pub log_level: String,
    /// Directory for the dated file log writer, if enabled.
    pub log_dir: Option<PathBuf>,

    // ── Sessions ─────────────────────────────────────────────────────

    /// Session configuration.
    pub session: SessionSettings,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Arbitrary extra settings.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            base_url: "/".to_string(),
            host: None,
            cache_routes: false,
            cache_dir: None,
            log_level: "info".to_string(),
            log_dir: None,
            session: SessionSettings::default(),
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    /// Returns the cache directory when route caching is enabled and a
    /// directory is configured.
    pub fn route_cache_dir(&self) -> Option<&PathBuf> {
        if self.cache_routes {
            self.cache_dir.as_ref()
        } else {
            None
        }
    }
}
