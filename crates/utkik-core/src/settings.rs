//! Settings consumed by the view layer.
//!
//! [`Settings`] holds the handful of knobs that influence name resolution,
//! default view configuration, template lookup, and logging. Use
//! [`settings_loader`](crate::settings_loader) to read them from a TOML file.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::apps::InstalledApps;

/// The complete set of utkik settings.
///
/// # Examples
///
/// ```
/// use utkik_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.views_module, "views");
/// assert!(settings.installed_apps.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled.
    pub debug: bool,
    /// The log level filter (e.g. "info", "utkik_views=debug").
    pub log_level: String,
    /// Dotted names of installed applications.
    pub installed_apps: Vec<String>,
    /// Submodule tried when a dotted name's module is an installed app.
    pub views_module: String,
    /// Directories searched for templates.
    pub template_dirs: Vec<PathBuf>,
    /// Custom settings that don't fit into the above.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            installed_apps: Vec::new(),
            views_module: "views".to_string(),
            template_dirs: Vec::new(),
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    /// Returns a custom setting from `extra`.
    pub fn get_extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }
}

impl InstalledApps for Settings {
    fn is_installed(&self, module_path: &str) -> bool {
        self.installed_apps.is_installed(module_path)
    }
}
