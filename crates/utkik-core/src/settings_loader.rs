//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `UTKIK_DEBUG` | `debug` |
//! | `UTKIK_LOG_LEVEL` | `log_level` |
//! | `UTKIK_INSTALLED_APPS` | `installed_apps` (comma-separated) |
//! | `UTKIK_VIEWS_MODULE` | `views_module` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use utkik_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("config/utkik.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::UtkikError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Keys missing from the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, UtkikError> {
    // Merge through serde_json so partial documents keep the defaults.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| UtkikError::Settings(format!("Failed to parse TOML: {e}")))?;

    let json_value = toml_to_json(toml_value);
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        UtkikError::Settings(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, json_value);
    serde_json::from_value(merged)
        .map_err(|e| UtkikError::Settings(format!("Failed to deserialize settings: {e}")))
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, UtkikError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        UtkikError::Settings(format!(
            "Failed to read TOML file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, UtkikError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Applies `UTKIK_*` environment variables on top of `settings`.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

/// Applies overrides from an arbitrary lookup, so callers and tests need not
/// touch the process environment.
pub fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(debug) = lookup("UTKIK_DEBUG") {
        settings.debug = matches!(debug.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
    }
    if let Some(level) = lookup("UTKIK_LOG_LEVEL") {
        settings.log_level = level;
    }
    if let Some(apps) = lookup("UTKIK_INSTALLED_APPS") {
        settings.installed_apps = apps
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(module) = lookup("UTKIK_VIEWS_MODULE") {
        settings.views_module = module;
    }
}

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::Value::from(i),
        toml::Value::Float(f) => serde_json::Value::from(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

fn merge_json(base: serde_json::Value, overlay: serde_json::Value) -> serde_json::Value {
    match (base, overlay) {
        (serde_json::Value::Object(mut base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            serde_json::Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}
