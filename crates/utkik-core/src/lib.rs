//! # utkik-core
//!
//! Core types, settings, installed apps, and error types for utkik.
//! This crate has no HTTP dependencies and provides the foundation the other
//! crates build on.
//!
//! ## Modules
//!
//! - [`error`] - The error taxonomy and result alias
//! - [`settings`] - Configuration consumed by the view layer
//! - [`settings_loader`] - Loading settings from TOML with environment overrides
//! - [`apps`] - The installed-applications check
//! - [`logging`] - Tracing-based logging integration
//! - [`utils`] - Text helpers

pub mod apps;
pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod utils;

// Re-export the most commonly used types at the crate root.
pub use apps::InstalledApps;
pub use error::{DispatchError, UtkikError, UtkikResult};
pub use settings::Settings;
