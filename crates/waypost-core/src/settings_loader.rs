//! Settings loading from configuration files.
//!
//! Loads [`Settings`] from TOML or JSON files and applies environment variable
//! overrides on top.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `WAYPOST_DEBUG` | `debug` |
//! | `WAYPOST_LOG_LEVEL` | `log_level` |
//! | `WAYPOST_BASE_URL` | `base_url` |
//! | `WAYPOST_HOST` | `host` |
//! | `WAYPOST_CACHE_ROUTES` | `cache_routes` |
//! | `WAYPOST_CACHE_DIR` | `cache_dir` |
//! | `WAYPOST_LOG_DIR` | `log_dir` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use waypost_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/waypost.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::WaypostError;
use crate::settings::Settings;

/// Loads settings from a TOML string. Keys not present keep their defaults.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, WaypostError> {
    // TOML -> JSON value, merged over the serialized defaults, so that partial
    // files keep every unspecified setting.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| WaypostError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, WaypostError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, WaypostError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, WaypostError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| WaypostError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, WaypostError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `WAYPOST_*` environment variable overrides to a settings struct.
///
/// Boolean variables accept "true"/"1"/"yes" (case-insensitive) as true and
/// anything else as false. An empty `WAYPOST_HOST` clears the host.
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("WAYPOST_DEBUG") {
        settings.debug = parse_flag(&val);
    }

    if let Ok(val) = std::env::var("WAYPOST_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Ok(val) = std::env::var("WAYPOST_BASE_URL") {
        settings.base_url = val;
    }

    if let Ok(val) = std::env::var("WAYPOST_HOST") {
        settings.host = if val.is_empty() { None } else { Some(val) };
    }

    if let Ok(val) = std::env::var("WAYPOST_CACHE_ROUTES") {
        settings.cache_routes = parse_flag(&val);
    }

    if let Ok(val) = std::env::var("WAYPOST_CACHE_DIR") {
        settings.cache_dir = Some(PathBuf::from(val));
    }

    if let Ok(val) = std::env::var("WAYPOST_LOG_DIR") {
        settings.log_dir = Some(PathBuf::from(val));
    }
}

// ============================================================
// Helpers
// ============================================================

fn parse_flag(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn read_config(path: &Path, format: &str) -> Result<String, WaypostError> {
    std::fs::read_to_string(path).map_err(|e| {
        WaypostError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(
    value: serde_json::Value,
    format: &str,
) -> Result<Settings, WaypostError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        WaypostError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        WaypostError::ConfigurationError(format!(
            "Failed to deserialize settings from {format}: {e}"
        ))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
