//! # utkik
//!
//! Lazy view dispatch for Rust web applications.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient
//! access. Depend on `utkik` to get everything, or on individual crates for
//! finer-grained control.

/// Errors, settings, installed apps, logging, and text helpers.
pub use utkik_core as core;

/// Request and response types.
pub use utkik_http as http;

/// Name resolution, lazy handles, guarded class-based views, and routing.
pub use utkik_views as views;

/// Third-party crates used in public signatures.
pub mod deps {
    pub use ::async_trait;
    pub use ::http;
    pub use ::serde_json;
    pub use ::tracing;
}

/// Common imports for application code.
///
/// ```
/// use utkik::prelude::*;
///
/// let settings = Settings::default();
/// assert_eq!(settings.views_module, "views");
/// ```
pub mod prelude {
    pub use utkik_core::{Settings, UtkikError, UtkikResult};
    pub use utkik_http::{HttpRequest, HttpResponse, JsonResponse};
    pub use utkik_views::{
        url, Guard, HandlerContext, HandlerResult, LazyHandle, NameResolver, RouteTable,
        TeraRenderer, View, ViewArgs, ViewInvoker, ViewModule, ViewRegistry,
    };
}
