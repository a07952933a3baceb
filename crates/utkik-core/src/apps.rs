//! Installed applications.
//!
//! The view layer asks one question about applications: is a given module
//! path a registered top-level app? [`Settings`](crate::settings::Settings)
//! answers it from `installed_apps`, and a plain list of names does too.

/// Reports whether a module path names an installed application.
///
/// Name resolution uses this to decide whether `app.View` may be retried as
/// `app.views.View`.
pub trait InstalledApps: Send + Sync {
    /// Returns `true` if `module_path` is a registered top-level application.
    fn is_installed(&self, module_path: &str) -> bool;
}

impl InstalledApps for Vec<String> {
    fn is_installed(&self, module_path: &str) -> bool {
        self.iter().any(|app| app == module_path)
    }
}
